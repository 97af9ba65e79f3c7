use super::validate_url as validate_url_impl;
use super::*;

#[test]
fn validate_url() {
    // Valid URLs
    assert!(validate_url_impl("https://example.com").is_ok());
    assert!(validate_url_impl("http://news.example.org/2024/05/markets").is_ok());

    // Invalid URLs
    assert!(validate_url_impl("ftp://example.com").is_err());
    assert!(validate_url_impl("not-a-url").is_err());
    assert!(validate_url_impl("").is_err());
    assert!(validate_url_impl("https://").is_err());
}

#[test]
fn prepare_urls_drops_blanks_and_duplicates() {
    let urls = prepare_urls(&[
        "  https://news.example.com/a ",
        "",
        "https://news.example.com/a",
    ])
    .expect("urls should be accepted");

    assert_eq!(urls, vec!["https://news.example.com/a"]);
}

#[test]
fn prepare_urls_keeps_input_order() {
    let urls = prepare_urls(&[
        "https://b.example.com/",
        "https://a.example.com/",
        "https://c.example.com/",
    ])
    .expect("urls should be accepted");

    assert_eq!(
        urls,
        vec![
            "https://b.example.com/",
            "https://a.example.com/",
            "https://c.example.com/",
        ]
    );
}

#[test]
fn prepare_urls_rejects_bad_input() {
    assert!(prepare_urls::<&str>(&[]).is_err());
    assert!(prepare_urls(&["", "   "]).is_err());
    assert!(prepare_urls(&["mailto:editor@example.com"]).is_err());
    assert!(
        prepare_urls(&[
            "https://a.example.com/",
            "https://b.example.com/",
            "https://c.example.com/",
            "https://d.example.com/",
        ])
        .is_err()
    );
}

mod integration_tests {
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    use super::*;

    async fn mount_page(server: &MockServer, route: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_owned(), "text/html"))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn fetches_documents_in_order() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "/business",
            "<html><head><title>Business</title></head><body><p>Acme Corp posted record profits this quarter.</p></body></html>",
        )
        .await;
        mount_page(
            &server,
            "/sport",
            "<html><head><title>Sport</title></head><body><p>The home team won again.</p></body></html>",
        )
        .await;

        let urls = vec![
            format!("{}/business", server.uri()),
            format!("{}/sport", server.uri()),
        ];
        let documents =
            fetch_documents(&HttpClient::default(), &urls).expect("fetch should succeed");

        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].source, urls[0]);
        assert_eq!(documents[0].title, "Business");
        assert_eq!(
            documents[0].text,
            "Acme Corp posted record profits this quarter."
        );
        assert_eq!(documents[1].source, urls[1]);
        assert_eq!(documents[1].text, "The home team won again.");
    }

    #[tokio::test]
    async fn any_failed_page_aborts_the_batch() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "/ok",
            "<html><body><p>Readable.</p></body></html>",
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let urls = vec![
            format!("{}/ok", server.uri()),
            format!("{}/missing", server.uri()),
        ];
        let error = fetch_documents(&HttpClient::default(), &urls)
            .expect_err("a 404 should fail the batch");

        assert!(matches!(error, FetchError::Network(_)));
        assert!(error.to_string().contains("HTTP error 404"));
    }

    #[tokio::test]
    async fn page_without_text_aborts_the_batch() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "/blank",
            "<html><body><script>1</script></body></html>",
        )
        .await;

        let urls = vec![format!("{}/blank", server.uri())];
        let error = fetch_documents(&HttpClient::default(), &urls)
            .expect_err("a page without text should fail the batch");

        assert!(matches!(error, FetchError::Extraction(_)));
        assert!(matches!(
            ResearchError::from(error),
            ResearchError::Extraction(_)
        ));
    }
}
