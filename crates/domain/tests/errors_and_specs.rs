//! Integration coverage for domain error mapping and query specs.

use call_telemetry_domain::{
    AlertRecord, AlertType, DomainError, EntityKind, QueryOptions, QuerySpec, Scope, ScopeLevel,
};
use call_telemetry_shared::{ErrorClass, ErrorEnvelope, ErrorKind};

#[test]
fn domain_errors_map_into_expected_envelopes() -> Result<(), DomainError> {
    let Err(error) = QueryOptions::default()
        .with_page_size("lots")
        .page_size
        .map_or(Ok(None), |size| size.resolve("page_size"))
    else {
        return Err(DomainError::InvalidNumber {
            option: "page_size",
            input: "lots".to_owned(),
        });
    };

    let envelope: ErrorEnvelope = error.into();
    assert_eq!(envelope.kind, ErrorKind::Expected);
    assert_eq!(envelope.class, ErrorClass::NonRetriable);
    assert_eq!(envelope.code.to_string(), "domain:invalid_query_option");
    assert_eq!(envelope.metadata_value("option"), Some("page_size"));
    assert_eq!(envelope.metadata_value("input"), Some("lots"));
    Ok(())
}

#[test]
fn unscoped_alert_maps_to_invalid_scope() {
    let Err(error) = AlertRecord::new(AlertType::TtsFailure.as_code()).into_point() else {
        return;
    };
    let envelope = ErrorEnvelope::from(error);
    assert_eq!(envelope.code.code(), "invalid_scope");
    assert_eq!(envelope.metadata_value("stream"), Some("alerts"));
}

#[test]
fn scopes_never_leak_between_levels() -> Result<(), DomainError> {
    let options = QueryOptions::default().with_page(1_i64).with_page_size(10_i64);
    let sp = QuerySpec::new(
        EntityKind::CallCount,
        Scope::parse(ScopeLevel::ServiceProvider, "sp-1")?,
        &options,
    )?;
    let account = QuerySpec::new(
        EntityKind::CallCount,
        Scope::parse(ScopeLevel::Account, "acct-1")?,
        &options,
    )?;

    assert_eq!(sp.stream().namespace(), "sp_call_counts");
    assert_eq!(account.stream().namespace(), "call_counts");

    let now = chrono::Utc::now();
    let sp_select = sp.bind(now)?.select;
    assert!(sp_select.to_influxql().contains("service_provider_sid = $service_provider_sid"));
    assert!(!sp_select.params.contains_key("account_sid"));
    Ok(())
}
