//! Write and query flows against a mocked InfluxDB HTTP API.

#[cfg(feature = "influx")]
mod influx {
    use serde_json::{Value, json};
    use std::process::{Command, Output};
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    type TestResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn run_cli(store_url: String, args: Vec<String>) -> std::io::Result<Output> {
        tokio::task::spawn_blocking(move || {
            let mut command = Command::new(env!("CARGO_BIN_EXE_ctel"));
            for (key, _) in std::env::vars() {
                if key.starts_with("CTEL_") {
                    command.env_remove(key);
                }
            }
            command
                .args(&args)
                .env("CTEL_STORE_URL", store_url)
                .env("CTEL_STORE_TIMEOUT_MS", "5000")
                .output()
        })
        .await
        .map_err(std::io::Error::other)?
    }

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| (*value).to_owned()).collect()
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

    fn stdout_json(output: &Output) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(&output.stdout)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn write_cdr_array_is_flushed_as_line_protocol() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .and(body_string_contains("SHOW+DATABASES"))
            .respond_with(databases(&["cdrs"]))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/write"))
            .and(query_param("db", "cdrs"))
            .and(query_param("precision", "ns"))
            .and(body_string_contains("account_sid=acct-1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let payload = json!([
            {"call_sid": "call-1", "account_sid": "acct-1", "service_provider_sid": "sp-1",
             "from": "15551230001", "to": "15551230002", "direction": "inbound",
             "answered": true, "duration": 42, "attempted_at": 1_700_000_000_000_i64},
            {"call_sid": "call-2", "account_sid": "acct-1", "service_provider_sid": "sp-1",
             "from": "15551230003", "to": "15551230004", "direction": "outbound",
             "answered": false, "duration": 0, "attempted_at": 1_700_000_001_000_i64}
        ])
        .to_string();
        let output = run_cli(
            server.uri(),
            args(&["--output", "json", "--quiet", "write", "cdr", "--json", &payload]),
        )
        .await?;
        assert_eq!(
            output.status.code(),
            Some(0),
            "{}",
            String::from_utf8_lossy(&output.stdout)
        );

        let value = stdout_json(&output)?;
        assert_eq!(value.pointer("/write/measurement"), Some(&json!("cdrs")));
        assert_eq!(value.pointer("/write/accepted"), Some(&json!(2)));
        assert_eq!(value.pointer("/write/dropped"), Some(&json!(0)));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn buffered_call_counts_flush_on_exit() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .and(body_string_contains("SHOW+DATABASES"))
            .respond_with(databases(&["sp_call_counts"]))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/write"))
            .and(query_param("db", "sp_call_counts"))
            .and(body_string_contains("service_provider_sid=sp-1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let payload = json!([
            {"service_provider_sid": "sp-1", "calls_in_progress": 4},
            {"service_provider_sid": "sp-1", "calls_in_progress": 5}
        ])
        .to_string();
        let output = run_cli(
            server.uri(),
            args(&[
                "--output",
                "json",
                "write",
                "call-count",
                "--scope",
                "sp",
                "--overrides-json",
                r#"{"buffer": {"commitSize": 10}}"#,
                "--json",
                &payload,
            ]),
        )
        .await?;
        assert_eq!(output.status.code(), Some(0));

        let value = stdout_json(&output)?;
        assert_eq!(value.pointer("/write/measurement"), Some(&json!("sp_call_counts")));
        assert_eq!(value.pointer("/write/flushed"), Some(&json!(2)));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn alert_query_returns_one_page() -> TestResult {
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
                        "values": [["1970-01-01T00:00:00Z", 7]]
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
                        "values": [["2023-11-14T22:13:20Z", "no-carrier", "acct-1", "no carrier"]]
                    }]
                }]
            })))
            .mount(&server)
            .await;

        let output = run_cli(
            server.uri(),
            args(&[
                "--output",
                "json",
                "query",
                "alerts",
                "--scope",
                "account",
                "--id",
                "acct-1",
                "--page",
                "2",
                "--page-size",
                "1",
            ]),
        )
        .await?;
        assert_eq!(output.status.code(), Some(0));

        let value = stdout_json(&output)?;
        assert_eq!(value.pointer("/result/total"), Some(&json!(7)));
        assert_eq!(value.pointer("/result/page"), Some(&json!(2)));
        assert_eq!(value.pointer("/result/page_size"), Some(&json!(1)));
        assert_eq!(
            value.pointer("/result/data/0/alert_type"),
            Some(&json!("no-carrier"))
        );
        Ok(())
    }
}
