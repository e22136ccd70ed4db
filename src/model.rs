use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// One container entry under a job's `container_nos` list.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Container {
    #[serde(default, deserialize_with = "loose_string")]
    pub container_number: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub size: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub arrival_date: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub detention_from: Option<String>,
}

/// One job record as returned by the upstream tracking API.
///
/// Every scalar is optional: the upstream mixes strings, numbers and nulls
/// freely, and records routinely omit fields. Anything we don't map is
/// ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct JobRecord {
    #[serde(default, deserialize_with = "loose_string")]
    pub job_no: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub job_date: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub custom_house: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub type_of_b_e: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub importer: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub supplier_exporter: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub invoice_number: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub invoice_date: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub inv_currency: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub invoice_value: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub unit_price: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub awb_bl_no: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub awb_bl_date: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub job_net_weight: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub loading_port: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub port_of_reporting: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub free_time: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub shipping_line_airline: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub no_of_container: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub be_no: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub be_date: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub cth_no: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub discharge_date: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub assessment_date: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub duty_paid_date: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub do_validity_upto_job_level: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub detailed_status: Option<String>,
    #[serde(default)]
    pub container_nos: Vec<Container>,
}

/// Accept strings, numbers and bools as strings; null and anything
/// structured becomes `None`.
fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

/// The upstream responds with either a bare list of jobs or `{"data": [...]}`.
/// Anything else aborts this refresh cycle.
pub fn extract_payload(payload: Value) -> Result<Vec<JobRecord>> {
    let items = match payload {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => items,
            Some(other) => return Err(eyre!("\"data\" field is {}, not a list", kind(&other))),
            None => return Err(eyre!("response object has no \"data\" list")),
        },
        other => return Err(eyre!("unexpected response shape: {}", kind(&other))),
    };

    items
        .into_iter()
        .map(|item| serde_json::from_value(item).map_err(Into::into))
        .collect()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
