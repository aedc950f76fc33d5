use shelf_harvest::config::{parse_config, Config};
use std::path::Path;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const SOURCE: &str = "Mock Shop";

/// Creates a test configuration pointing at `base_url` with zero pacing delay
pub fn create_test_config(base_url: &str, root: &Path) -> Config {
    let toml = format!(
        r#"
[scheduler]
check-interval = 1
output-dir = "{out}"
database-path = "{db}"
retry-base-delay = 0.0
request-timeout = 5

[user-agent]
crawler-name = "TestHarvester"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "ops@example.com"

[[source]]
name = "{source}"
sitemap = "{base}/sitemap.xml"
url-patterns = ["/p/"]
concurrency = 2
interval-hours = 1.0
max-urls = 50

[source.rate-limit]
min-delay = 0.0
max-delay = 0.0
max-retries = 1
max-backoff = 1.0
"#,
        out = root.join("data").display(),
        db = root.join("data").join("products.db").display(),
        source = SOURCE,
        base = base_url,
    );
    parse_config(&toml).expect("test config should be valid")
}

pub fn product_page(title: &str, brand: &str, price: &str) -> String {
    format!(
        r##"<html><body>
  <ul class="breadcrumb">
    <li><a href="/">Home</a></li>
    <li><a href="/c/phones">Phones</a></li>
    <li><a href="#">{title}</a></li>
  </ul>
  <h1 class="product-name">{title}</h1>
  <div class="brand-title"><a href="/b">{brand}</a></div>
  <div class="description-content">A {brand} phone.</div>
  <div class="product-price"><span class="amount">{price}</span></div>
  <div class="thumb-container"><img src="/img/{brand}.jpg"></div>
</body></html>"##
    )
}

pub fn urlset(base_url: &str, paths: &[&str]) -> String {
    let entries: String = paths
        .iter()
        .map(|p| format!("<url><loc>{}{}</loc></url>", base_url, p))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{}</urlset>"#,
        entries
    )
}

pub async fn mount_page(server: &MockServer, route: &str, status: u16, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(status)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

/// Mounts a small shop: two good products, one blocked by robots.txt, one
/// server error, one rate-limited page and one non-product page
pub async fn mount_shop(server: &MockServer) {
    let base = server.uri();

    mount_page(
        server,
        "/robots.txt",
        200,
        "User-agent: *\nDisallow: /p/private\n".to_string(),
    )
    .await;
    mount_page(
        server,
        "/sitemap.xml",
        200,
        format!(
            r#"<sitemapindex><sitemap><loc>{base}/sitemap-products.xml</loc></sitemap></sitemapindex>"#
        ),
    )
    .await;
    mount_page(
        server,
        "/sitemap-products.xml",
        200,
        urlset(
            &base,
            &[
                "/p/phone-1",
                "/p/phone-2",
                "/about",
                "/p/private",
                "/p/broken",
                "/p/busy",
                "/p/phone-1",
            ],
        ),
    )
    .await;
    mount_page(
        server,
        "/p/phone-1",
        200,
        product_page("Galaxy Phone", "Samsung", "R 9,999.00"),
    )
    .await;
    mount_page(
        server,
        "/p/phone-2",
        200,
        product_page("Pixel Phone", "Google", "R 8,499.00"),
    )
    .await;
    mount_page(server, "/p/private", 200, product_page("Secret", "Hidden", "R 1")).await;
    mount_page(server, "/p/broken", 500, "oops".to_string()).await;
    mount_page(server, "/p/busy", 429, "slow down".to_string()).await;
}
