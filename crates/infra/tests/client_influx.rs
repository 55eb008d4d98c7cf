//! Client wiring against a mocked InfluxDB HTTP API.
#![allow(missing_docs)]

#[cfg(feature = "influx")]
mod influx {
    use call_telemetry_config::TelemetryConfig;
    use call_telemetry_domain::{AccountSid, AlertRecord, QueryOptions, RecordValue};
    use call_telemetry_infra::TelemetryClient;
    use call_telemetry_ports::StoreErrorKind;
    use call_telemetry_shared::{RequestContext, Result};
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, commit_size: u32) -> Result<TelemetryClient> {
        let mut config = TelemetryConfig::default();
        config.store.url = server.uri();
        config.buffer.commit_size = commit_size;
        TelemetryClient::builder(config.validate_and_normalize()?).build()
    }

    fn databases(names: &[&str]) -> ResponseTemplate {
        let values: Vec<_> = names.iter().map(|name| json!([name])).collect();
        ResponseTemplate::new(200).set_body_json(json!({
            "results": [{
                "statement_id": 0,
                "series": [{ "name": "databases", "columns": ["name"], "values": values }]
            }]
        }))
    }

    fn alert() -> Result<AlertRecord> {
        Ok(AlertRecord {
            account_sid: Some(AccountSid::parse("acct-1")?),
            vendor: Some("acme".into()),
            ..AlertRecord::new("no-tts")
        })
    }

    #[tokio::test]
    async fn missing_namespace_is_created_before_first_write() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .and(body_string_contains("SHOW+DATABASES"))
            .respond_with(databases(&["_internal"]))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .and(body_string_contains("CREATE+DATABASE+alerts"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"results": [{"statement_id": 0}]})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/write"))
            .and(query_param("db", "alerts"))
            .and(body_string_contains("alert_type=no-tts"))
            .respond_with(ResponseTemplate::new(204))
            .expect(2)
            .mount(&server)
            .await;

        let client = client(&server, 1)?;
        let ctx = RequestContext::new_request();
        client.write_alerts(&ctx, alert()?).await?;
        client.write_alerts(&ctx, alert()?).await?;
        client.shutdown(&ctx).await?;
        Ok(())
    }

    #[tokio::test]
    async fn buffered_points_reach_the_store_on_shutdown() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .and(body_string_contains("SHOW+DATABASES"))
            .respond_with(databases(&["alerts"]))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/write"))
            .and(query_param("db", "alerts"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server, 50)?;
        let ctx = RequestContext::new_request();
        client.write_alerts(&ctx, vec![alert()?, alert()?, alert()?]).await?;
        assert_eq!(client.shutdown(&ctx).await?, 3);
        Ok(())
    }

    #[tokio::test]
    async fn rejected_write_surfaces_as_write_error() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(databases(&["alerts"]))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/write"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "bad line"})))
            .mount(&server)
            .await;

        let client = client(&server, 1)?;
        let error = client
            .write_alerts(&RequestContext::new_request(), alert()?)
            .await
            .err();
        assert_eq!(error.as_ref().and_then(StoreErrorKind::of), Some(StoreErrorKind::Write));
        Ok(())
    }

    #[tokio::test]
    async fn alert_query_counts_then_selects_page() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .and(body_string_contains("SHOW+DATABASES"))
            .respond_with(databases(&["alerts"]))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .and(body_string_contains("COUNT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{
                    "statement_id": 0,
                    "series": [{
                        "name": "alerts",
                        "columns": ["time", "count"],
                        "values": [["1970-01-01T00:00:00Z", 1]]
                    }]
                }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .and(body_string_contains("LIMIT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{
                    "statement_id": 0,
                    "series": [{
                        "name": "alerts",
                        "columns": ["time", "alert_type", "account_sid", "message"],
                        "values": [["2023-11-14T22:13:20Z", "no-tts", "acct-1", "no voice"]]
                    }]
                }]
            })))
            .mount(&server)
            .await;

        let client = client(&server, 1)?;
        let page = client
            .query_alerts(&RequestContext::new_request(), "acct-1", QueryOptions::default())
            .await?;
        assert_eq!(page.total, 1);
        let row = page.data.first();
        assert_eq!(
            row.and_then(|row| row.get("alert_type")).and_then(RecordValue::as_text),
            Some("no-tts")
        );
        assert!(row
            .and_then(|row| row.get("time"))
            .is_some_and(|time| time.as_timestamp().is_some()));
        Ok(())
    }
}
