//! InfluxDB HTTP gateway.

use super::auth::InfluxAuth;
use super::error::{
    InfluxErrorContext, cancelled_error, invalid_response_error, map_http_error,
    map_statement_error, map_transport_error, timeout_error,
};
use super::line_protocol::encode_points;
use call_telemetry_config::StoreConfig;
use call_telemetry_domain::quote_ident;
use call_telemetry_ports::{
    BoundQuery, BoxFuture, QueryResponse, QuerySeries, StoreErrorKind, StoreGatewayPort,
    TelemetryPoint,
};
use call_telemetry_shared::{
    ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result, SecretString,
};
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;
use url::form_urlencoded;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const LINE_PROTOCOL_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// InfluxDB adapter configuration.
#[derive(Debug, Clone)]
pub struct InfluxRestConfig {
    /// Base URL of the HTTP API (`http://host:8086`).
    pub base_url: Box<str>,
    /// Basic-auth user.
    pub username: Option<Box<str>>,
    /// Basic-auth password.
    pub password: Option<SecretString>,
    /// API token.
    pub token: Option<SecretString>,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl InfluxRestConfig {
    /// Adapter settings from the validated store section.
    #[must_use]
    pub fn from_store_config(config: &StoreConfig) -> Self {
        Self {
            base_url: config.url.as_str().into(),
            username: config.username.as_deref().map(Into::into),
            password: config.password.clone(),
            token: config.token.clone(),
            timeout_ms: config.timeout_ms,
        }
    }

    /// Validates invariants for the adapter.
    pub fn validate(&self) -> Result<Url> {
        let url = Url::parse(self.base_url.trim()).map_err(|error| {
            ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                format!("invalid InfluxDB URL: {error}"),
            )
        })?;
        if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "InfluxDB URL must be an http(s) base URL",
            ));
        }
        if self.timeout_ms == 0 {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "InfluxDB timeout must be greater than zero",
            ));
        }
        Ok(url)
    }
}

#[derive(Debug, Deserialize)]
struct QueryBody {
    #[serde(default)]
    results: Vec<StatementResult>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[serde(default)]
    series: Vec<SeriesBody>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SeriesBody {
    #[serde(default)]
    name: String,
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Store gateway speaking the InfluxDB 1.x HTTP API.
#[derive(Clone)]
pub struct InfluxStoreGateway {
    client: reqwest::Client,
    base_url: Url,
    auth: InfluxAuth,
    timeout: Duration,
}

impl InfluxStoreGateway {
    /// Build a gateway from configuration.
    pub fn new(config: &InfluxRestConfig) -> Result<Self> {
        let base_url = config.validate()?;
        let timeout = Duration::from_millis(config.timeout_ms);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| {
                ErrorEnvelope::unexpected(
                    ErrorCode::new("influx", "client_init_failed"),
                    format!("failed to build InfluxDB client: {error}"),
                    ErrorClass::NonRetriable,
                )
            })?;

        Ok(Self {
            client,
            base_url,
            auth: InfluxAuth::from_credentials(
                config.username.as_deref(),
                config.password.as_ref(),
                config.token.as_ref(),
            ),
            timeout,
        })
    }

    fn endpoint(&self, name: &str, ctx: &InfluxErrorContext) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| invalid_response_error("InfluxDB URL cannot be a base", ctx))?
            .pop_if_empty()
            .push(name);
        Ok(url)
    }

    async fn execute(
        &self,
        ctx: &RequestContext,
        request: reqwest::RequestBuilder,
        error_ctx: &InfluxErrorContext,
    ) -> Result<String> {
        ctx.ensure_not_cancelled(error_ctx.operation)?;
        let request = self.auth.apply(request);
        tracing::debug!(
            operation = error_ctx.operation,
            endpoint = error_ctx.endpoint,
            namespace = error_ctx.namespace.as_deref(),
            correlation_id = ctx.correlation_id().as_str(),
            "influx request"
        );

        let response = tokio::select! {
            () = ctx.cancelled() => return Err(cancelled_error(error_ctx)),
            res = tokio::time::timeout(self.timeout, request.send()) => res,
        };
        let response = match response {
            Ok(result) => result.map_err(|error| map_transport_error(&error, error_ctx))?,
            Err(_) => return Err(timeout_error(error_ctx)),
        };

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| map_transport_error(&error, error_ctx))?;
        if !status.is_success() {
            let error = map_http_error(status.as_u16(), &body, error_ctx);
            tracing::warn!(
                operation = error_ctx.operation,
                http_status = status.as_u16(),
                code = %error.code,
                "influx request rejected"
            );
            return Err(error);
        }
        Ok(body)
    }

    async fn run_query(
        &self,
        ctx: &RequestContext,
        form: String,
        error_ctx: &InfluxErrorContext,
    ) -> Result<QueryResponse> {
        let url = self.endpoint("query", error_ctx)?;
        let request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE))
            .body(form);
        let body = self.execute(ctx, request, error_ctx).await?;
        parse_query_body(&body, error_ctx)
    }

    async fn list(&self, ctx: &RequestContext) -> Result<Vec<Box<str>>> {
        let error_ctx = InfluxErrorContext::new("influx.list_namespaces", "/query", None);
        let form = form_urlencoded::Serializer::new(String::new())
            .append_pair("q", "SHOW DATABASES")
            .finish();
        let response = self.run_query(ctx, form, &error_ctx).await?;
        Ok(response
            .series
            .iter()
            .flat_map(|series| series.values.iter())
            .filter_map(|row| row.first().and_then(Value::as_str))
            .map(Into::into)
            .collect())
    }

    async fn create(&self, ctx: &RequestContext, namespace: &str) -> Result<()> {
        let error_ctx =
            InfluxErrorContext::new("influx.create_namespace", "/query", Some(namespace));
        let statement = format!("CREATE DATABASE {}", quote_ident(namespace));
        let form = form_urlencoded::Serializer::new(String::new())
            .append_pair("q", &statement)
            .finish();
        self.run_query(ctx, form, &error_ctx).await?;
        Ok(())
    }

    async fn write(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        points: &[TelemetryPoint],
    ) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        let error_ctx = InfluxErrorContext::new("influx.bulk_write", "/write", Some(namespace));
        let body = encode_points(points)?;
        let mut url = self.endpoint("write", &error_ctx)?;
        url.query_pairs_mut()
            .append_pair("db", namespace)
            .append_pair("precision", "ns");
        let request = self
            .client
            .post(url)
            .header(
                CONTENT_TYPE,
                HeaderValue::from_static(LINE_PROTOCOL_CONTENT_TYPE),
            )
            .body(body);
        self.execute(ctx, request, &error_ctx).await?;
        Ok(())
    }

    async fn select(&self, ctx: &RequestContext, query: &BoundQuery) -> Result<QueryResponse> {
        let error_ctx = InfluxErrorContext::new("influx.query", "/query", Some(query.namespace));
        let params = serde_json::to_string(&query.parameters()).map_err(|error| {
            invalid_response_error(format!("failed to encode query params: {error}"), &error_ctx)
        })?;
        let form = form_urlencoded::Serializer::new(String::new())
            .append_pair("db", query.namespace)
            .append_pair("q", &query.to_influxql())
            .append_pair("params", &params)
            .finish();
        self.run_query(ctx, form, &error_ctx).await
    }
}

impl StoreGatewayPort for InfluxStoreGateway {
    fn provider_id(&self) -> &str {
        "influx"
    }

    fn list_namespaces(&self, ctx: &RequestContext) -> BoxFuture<'_, Result<Vec<Box<str>>>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            self.list(&ctx)
                .await
                .map_err(|error| StoreErrorKind::Initialization.wrap(error))
        })
    }

    fn create_namespace(
        &self,
        ctx: &RequestContext,
        namespace: Box<str>,
    ) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            self.create(&ctx, &namespace)
                .await
                .map_err(|error| StoreErrorKind::Initialization.wrap(error))
        })
    }

    fn bulk_write(
        &self,
        ctx: &RequestContext,
        namespace: Box<str>,
        points: Vec<TelemetryPoint>,
    ) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            self.write(&ctx, &namespace, &points)
                .await
                .map_err(|error| {
                    StoreErrorKind::Write
                        .wrap(error)
                        .with_metadata("points", points.len().to_string())
                })
        })
    }

    fn query(
        &self,
        ctx: &RequestContext,
        query: BoundQuery,
    ) -> BoxFuture<'_, Result<QueryResponse>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            self.select(&ctx, &query)
                .await
                .map_err(|error| StoreErrorKind::Query.wrap(error))
        })
    }
}

fn parse_query_body(body: &str, ctx: &InfluxErrorContext) -> Result<QueryResponse> {
    let parsed: QueryBody = serde_json::from_str(body).map_err(|error| {
        invalid_response_error(format!("invalid InfluxDB response: {error}"), ctx)
    })?;
    if let Some(message) = parsed.error {
        return Err(map_statement_error(&message, ctx));
    }

    let mut series = Vec::new();
    for result in parsed.results {
        if let Some(message) = result.error {
            return Err(map_statement_error(&message, ctx));
        }
        series.extend(result.series.into_iter().map(|body| QuerySeries {
            name: body.name.into_boxed_str(),
            columns: body.columns.into_iter().map(String::into_boxed_str).collect(),
            values: body.values,
        }));
    }
    Ok(QueryResponse { series })
}
