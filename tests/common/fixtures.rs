//! Listing page fixtures and mock server helpers

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// One listing anchor: relative href and anchor text
pub type Anchor<'a> = (&'a str, &'a str);

/// Anchors of the 2023 listing used by most scenarios
///
/// - 3930 regular and 3930 extra (marker in the URL only), same day
/// - a repeated 3930 regular entry
/// - 3945 with two different URLs for the same part (conflict)
/// - a 2024 entry on the 2023 page
/// - 3960 pointing at a document the server does not have
/// - 3970 extra edition in two parts, listed out of order
pub const LISTING_2023: &[Anchor<'static>] = &[
    ("pdf/2023-01-10.pdf", "Edição 3930 - 2023-01-10"),
    ("pdf/2023-01-10-suplemento.pdf", "Edição 3930 - 2023-01-10"),
    ("pdf/2023-01-10.pdf", "Edição 3930 - 2023-01-10"),
    ("pdf/2023-02-01-a.pdf", "Edição 3945 - 2023-02-01"),
    ("pdf/2023-02-01-b.pdf", "Edição 3945 - 2023-02-01"),
    (
        "pdf/2024-01-02.pdf",
        "Edição 4102 - 2024-01-02 (republicada de 2023-12-29)",
    ),
    ("pdf/2023-03-01.pdf", "Edição 3960 - 2023-03-01"),
    ("pdf/2023-04-01-sup.pdf", "Edição 3970 - SUPLEMENTO - 2023-04-01"),
    ("pdf/2023-04-01-ext.pdf", "Edição 3970 - Extraordinária - 2023-04-01"),
];

/// Documents of [`LISTING_2023`] the server serves (3960 is missing)
pub const DOCUMENTS_2023: &[&str] = &[
    "/pdf/2023-01-10.pdf",
    "/pdf/2023-01-10-suplemento.pdf",
    "/pdf/2023-02-01-a.pdf",
    "/pdf/2023-02-01-b.pdf",
    "/pdf/2023-04-01-sup.pdf",
    "/pdf/2023-04-01-ext.pdf",
];

/// Render anchors inside the listing column of a page
pub fn listing_html(anchors: &[Anchor<'_>]) -> String {
    let links: String = anchors
        .iter()
        .map(|(href, text)| format!("<p><a href=\"{}\">{}</a></p>\n", href, text))
        .collect();
    format!(
        r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>Diário Oficial</title></head>
<body>
  <div class="container">
    <div class="row">
      <div class="col-sm-4"><a href="index.php">Início</a></div>
      <div class="col-sm-8">
{}      </div>
    </div>
  </div>
</body></html>"#,
        links
    )
}

/// Body served for a document path
pub fn document_body(document_path: &str) -> Vec<u8> {
    format!("%PDF-1.4 {}", document_path).into_bytes()
}

/// Serve the listing page of `year`
pub async fn mount_listing(server: &MockServer, year: i32, anchors: &[Anchor<'_>]) {
    Mock::given(method("GET"))
        .and(path("/anop.php"))
        .and(query_param("ano", year.to_string()))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/html; charset=utf-8")
                .set_body_string(listing_html(anchors)),
        )
        .mount(server)
        .await;
}

/// Answer the listing page of `year` with a server error
pub async fn mount_broken_listing(server: &MockServer, year: i32) {
    Mock::given(method("GET"))
        .and(path("/anop.php"))
        .and(query_param("ano", year.to_string()))
        .respond_with(ResponseTemplate::new(500))
        .mount(server)
        .await;
}

/// Serve every document path with a body derived from the path
pub async fn mount_documents(server: &MockServer, document_paths: &[&str]) {
    for document_path in document_paths {
        Mock::given(method("GET"))
            .and(path(*document_path))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "application/pdf")
                    .set_body_bytes(document_body(document_path)),
            )
            .mount(server)
            .await;
    }
}
