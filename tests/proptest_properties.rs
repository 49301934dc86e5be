//! Property-based tests using proptest
//!
//! SQL value quoting, worksheet range addresses and pagination totals
//! checked over randomized inputs.

use dataconnect::config::{AuditSettings, GraphSettings, SiteContext};
use dataconnect::graph::client::GraphClient;
use dataconnect::graph::content::{column_letter, range_address};
use dataconnect::graph::lister::fetch_all_pages;
use dataconnect::sql::template::{quote_value, render, Variables};
use proptest::prelude::*;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Column number from spreadsheet letters, the inverse of `column_letter`
fn column_number(letters: &str) -> usize {
    letters
        .bytes()
        .fold(0, |acc, b| acc * 26 + usize::from(b - b'A') + 1)
}

fn unquote(literal: &str) -> Option<String> {
    let inner = literal.strip_prefix('\'')?.strip_suffix('\'')?;
    if inner.replace("''", "").contains('\'') {
        return None;
    }
    Some(inner.replace("''", "'"))
}

proptest! {
    #[test]
    fn integers_pass_through(value in any::<i64>()) {
        let raw = value.to_string();
        prop_assert_eq!(quote_value(&raw), raw);
    }

    #[test]
    fn decimals_pass_through(value in -1.0e9f64..1.0e9) {
        let raw = format!("{value:.4}");
        prop_assert_eq!(quote_value(&raw), raw);
    }

    #[test]
    fn text_is_quoted_and_recoverable(value in "[a-zA-Z' _-]{1,30}") {
        prop_assume!(value.trim().parse::<f64>().is_err());

        let quoted = quote_value(&value);
        prop_assert_eq!(unquote(&quoted), Some(value));
    }

    #[test]
    fn render_applies_quoting(value in "[a-z0-9' .-]{0,20}") {
        let mut vars = Variables::new();
        vars.insert("v".to_string(), value.clone());

        let sql = render("SELECT {{ v }}", &vars).unwrap();
        prop_assert_eq!(sql, format!("SELECT {}", quote_value(&value)));
    }

    #[test]
    fn column_letters_round_trip(column in 1usize..20_000) {
        let letters = column_letter(column);
        prop_assert!(letters.bytes().all(|b| b.is_ascii_uppercase()));
        prop_assert_eq!(column_number(&letters), column);
    }

    #[test]
    fn range_starts_below_header(rows in 1usize..100_000, columns in 1usize..2_000) {
        let address = range_address(rows, columns).unwrap();
        let expected = format!("A2:{}{}", column_letter(columns), rows + 1);
        prop_assert_eq!(address, expected);
    }
}

async fn paged_client(server: &MockServer) -> GraphClient {
    Mock::given(method("POST"))
        .and(path("/tenant/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "t"})))
        .mount(server)
        .await;

    let settings = GraphSettings {
        graph_base_url: server.uri(),
        login_base_url: server.uri(),
        audit: AuditSettings {
            enabled: false,
            ..Default::default()
        },
        ..Default::default()
    };
    let site = SiteContext {
        tenant_id: "tenant".into(),
        client_id: "app".into(),
        client_secret: "secret".into(),
        site_id: "site".into(),
        list_id: "list".into(),
    };
    GraphClient::new(settings, site).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn pagination_collects_every_entry(sizes in prop::collection::vec(0usize..6, 1..6)) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let collected = runtime.block_on(async {
            let server = MockServer::start().await;
            let client = paged_client(&server).await;

            for (page, size) in sizes.iter().enumerate() {
                let items: Vec<_> = (0..*size).map(|i| json!({"id": format!("{page}-{i}")})).collect();
                let mut body = json!({"value": items});
                if page + 1 < sizes.len() {
                    body["@odata.nextLink"] = json!(format!("{}/pages/{}", server.uri(), page + 1));
                }
                Mock::given(method("GET"))
                    .and(path(format!("/pages/{page}")))
                    .respond_with(ResponseTemplate::new(200).set_body_json(body))
                    .mount(&server)
                    .await;
            }

            fetch_all_pages(&client, &format!("{}/pages/0", server.uri())).await.unwrap()
        });

        prop_assert_eq!(collected.len(), sizes.iter().sum::<usize>());
        let ids: Vec<String> = collected.iter().map(|v| v["id"].as_str().unwrap().to_string()).collect();
        let expected: Vec<String> = sizes
            .iter()
            .enumerate()
            .flat_map(|(page, size)| (0..*size).map(move |i| format!("{page}-{i}")))
            .collect();
        prop_assert_eq!(ids, expected);
    }
}
