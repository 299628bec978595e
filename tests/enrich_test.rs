mod common;

use std::sync::Arc;

use agenda_scraper::app::ports::BrowserPort;
use agenda_scraper::enrich::DetailEnricher;
use agenda_scraper::redirect::RedirectResolver;
use agenda_scraper::types::RawCandidate;

use common::{FakeBrowser, FakeHttp};

const JSON_LD_PAGE: &str = r#"<html><head>
<script type="application/ld+json">
{"@context":"https://schema.org","@type":"Event","name":"Festival de Inverno de Garanhuns - Recife",
 "startDate":"2026-03-05","location":{"@type":"Place","name":"Teatro de Santa Isabel"}}
</script></head><body><h1>Ingressos</h1></body></html>"#;

fn enricher(browser: Arc<FakeBrowser>, http: FakeHttp) -> DetailEnricher {
    let port: Arc<dyn BrowserPort> = browser;
    DetailEnricher::new(port, Arc::new(RedirectResolver::new(Arc::new(http), 8)))
}

fn candidate(source: &str, title: &str, link: &str) -> RawCandidate {
    let mut c = RawCandidate::new(source, title.to_string(), link.to_string());
    c.raw_date_text = "sex, 05 mar".to_string();
    c.raw_location_text = "Recife".to_string();
    c
}

#[tokio::test]
async fn structured_data_overwrites_listing_fields() -> anyhow::Result<()> {
    let browser = Arc::new(FakeBrowser::default().with_page("https://s.example/evento/1", JSON_LD_PAGE));
    let mut batch = vec![candidate("sympla", "Festival de Inverno", "https://s.example/evento/1")];

    enricher(browser.clone(), FakeHttp::default()).enrich(&mut batch).await;

    assert_eq!(batch[0].title, "Festival de Inverno de Garanhuns - Recife");
    assert_eq!(batch[0].raw_date_text, "2026-03-05");
    assert_eq!(batch[0].raw_location_text, "Teatro de Santa Isabel");
    assert_eq!(batch[0].link, "https://s.example/evento/1");
    assert_eq!(browser.opened(), 1);
    assert_eq!(browser.closed(), 1);
    Ok(())
}

#[tokio::test]
async fn empty_detail_pages_never_downgrade_fields() -> anyhow::Result<()> {
    let browser = Arc::new(
        FakeBrowser::default().with_page("https://s.example/evento/2", "<html><body></body></html>"),
    );
    let mut batch = vec![candidate("sympla", "Show de Forró", "https://s.example/evento/2")];

    enricher(browser, FakeHttp::default()).enrich(&mut batch).await;

    assert_eq!(batch[0].title, "Show de Forró");
    assert_eq!(batch[0].raw_date_text, "sex, 05 mar");
    assert_eq!(batch[0].raw_location_text, "Recife");
    Ok(())
}

#[tokio::test]
async fn failures_and_skipped_candidates_leave_the_batch_intact() -> anyhow::Result<()> {
    let browser = Arc::new(FakeBrowser::default().with_page("https://s.example/evento/ok", JSON_LD_PAGE));
    let mut skipped = candidate("google_events", "Baile", "https://g.example/1");
    skipped.skip_enrich = true;
    let mut batch = vec![
        candidate("sympla", "Show fora do ar", "https://s.example/evento/offline"),
        skipped.clone(),
        candidate("sympla", "Festival", "https://s.example/evento/ok"),
    ];

    enricher(browser.clone(), FakeHttp::default()).enrich(&mut batch).await;

    assert_eq!(batch[0].title, "Show fora do ar");
    assert_eq!(batch[1], skipped);
    assert_eq!(batch[2].title, "Festival de Inverno de Garanhuns - Recife");
    assert!(!browser.visited().contains(&"https://g.example/1".to_string()));
    assert_eq!(browser.opened(), browser.closed());
    Ok(())
}

#[tokio::test]
async fn gateway_candidates_follow_the_outbound_link() -> anyhow::Result<()> {
    let browser = Arc::new(
        FakeBrowser::default()
            .with_page(
                "https://conecta.recife.pe.gov.br/evento/7",
                r#"<body><h1>Oficina de xilogravura</h1><p>Dia 14/02</p>
                   <a href="https://bit.ly/oficina">Acesse o site do evento</a></body>"#,
            )
            .with_page(
                "https://conecta.recife.pe.gov.br/evento/8",
                r#"<body><h1>Roda de coco</h1><a href="/eventos">Voltar</a></body>"#,
            ),
    );
    let http = FakeHttp::default()
        .with_redirect("https://bit.ly/oficina", "https://www.sympla.com.br/evento/oficina/99")
        .with_body("https://www.sympla.com.br/evento/oficina/99", "<html></html>");
    let mut batch = vec![
        candidate("conecta_recife", "Oficina", "https://conecta.recife.pe.gov.br/evento/7"),
        candidate("conecta_recife", "Roda", "https://conecta.recife.pe.gov.br/evento/8"),
    ];

    enricher(browser, http).enrich(&mut batch).await;

    assert_eq!(batch[0].title, "Oficina de xilogravura");
    assert_eq!(batch[0].link, "https://www.sympla.com.br/evento/oficina/99");
    assert_eq!(batch[0].original_link, "https://conecta.recife.pe.gov.br/evento/7");
    assert_eq!(batch[1].title, "Roda de coco");
    assert_eq!(batch[1].link, "https://conecta.recife.pe.gov.br/evento/8");
    Ok(())
}
