use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::model::{Container, JobRecord};

pub const HEADERS: [&str; 18] = [
    "JOB NO AND DATE",
    "IMPORTER",
    "SUPPLIER/ EXPORTER",
    "INVOICE NUMBER AND DATE",
    "INVOICE VALUE AND UNIT PRICE",
    "BL NUMBER AND DATE",
    "COMMODITY",
    "NET WEIGHT",
    "PORT",
    "ARRIVAL DATE",
    "FREE TIME",
    "DETENTION FROM",
    "SHIPPING LINE",
    "CONTAINER NUM & SIZE",
    "NUMBER OF CONTAINERS",
    "BE NUMBER AND DATE",
    "REMARKS",
    "DETAILED STATUS",
];

pub type JobTable = Vec<JobRow>;

/// One flat row of the report table.
///
/// Keeps the raw lookup keys alongside the joined display cells so the
/// search endpoints don't have to re-split formatted strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRow {
    pub job_no: String,
    pub job_date: Option<NaiveDate>,
    pub invoice_number: String,
    pub be_no: String,
    pub cth_no: String,
    pub container_numbers: Vec<String>,

    pub job_no_and_date: String,
    pub importer: String,
    pub supplier_exporter: String,
    pub invoice_number_and_date: String,
    pub invoice_value_and_unit_price: String,
    pub bl_number_and_date: String,
    pub commodity: String,
    pub net_weight: String,
    pub port: String,
    pub arrival_date: String,
    pub free_time: String,
    pub detention_from: String,
    pub shipping_line: String,
    pub container_num_and_size: String,
    pub no_of_containers: String,
    pub be_number_and_date: String,
    pub remarks: String,
    pub detailed_status: String,
}

impl JobRow {
    pub fn from_record(record: &JobRecord) -> Self {
        let job_no = text(&record.job_no).to_string();
        let containers = &record.container_nos;

        let container_numbers: Vec<String> = containers
            .iter()
            .filter_map(|c| c.container_number.clone())
            .filter(|n| !n.is_empty())
            .collect();

        let container_num_and_size = containers
            .iter()
            .map(|c| format!("{} - {}", text(&c.container_number), text(&c.size)))
            .collect::<Vec<_>>()
            .join(", ");

        let remarks = format!(
            "Discharge_Date: {} | Arrival_Date: {} | Duty_Paid_Date: {} | DO_Validity_Upto_Job_Level: {}",
            format_date(text(&record.discharge_date)),
            format_date(text(&record.assessment_date)),
            format_date(text(&record.duty_paid_date)),
            format_date(text(&record.do_validity_upto_job_level)),
        );

        Self {
            job_no_and_date: format!(
                "{} | {} | {} | {}",
                job_no,
                format_date(text(&record.job_date)),
                text(&record.custom_house),
                text(&record.type_of_b_e),
            ),
            job_no,
            job_date: parse_date(text(&record.job_date)),
            invoice_number: text(&record.invoice_number).to_string(),
            be_no: text(&record.be_no).to_string(),
            cth_no: text(&record.cth_no).to_string(),
            container_numbers,
            importer: text(&record.importer).to_string(),
            supplier_exporter: text(&record.supplier_exporter).to_string(),
            invoice_number_and_date: format!(
                "{} | {}",
                text(&record.invoice_number),
                format_date(text(&record.invoice_date)),
            ),
            invoice_value_and_unit_price: format!(
                "{} {} | {}",
                text(&record.inv_currency),
                text(&record.invoice_value),
                text(&record.unit_price),
            ),
            bl_number_and_date: format!(
                "{} | {}",
                text(&record.awb_bl_no),
                format_date(text(&record.awb_bl_date)),
            ),
            commodity: text(&record.description).to_string(),
            net_weight: text(&record.job_net_weight).to_string(),
            port: format!(
                "POL: {} POD: {}",
                text(&record.loading_port),
                text(&record.port_of_reporting),
            ),
            arrival_date: join_container_dates(containers, |c| c.arrival_date.as_deref()),
            free_time: text(&record.free_time).to_string(),
            detention_from: join_container_dates(containers, |c| c.detention_from.as_deref()),
            shipping_line: text(&record.shipping_line_airline).to_string(),
            container_num_and_size,
            no_of_containers: text(&record.no_of_container).to_string(),
            be_number_and_date: format!(
                "{} | {}",
                text(&record.be_no),
                format_date(text(&record.be_date)),
            ),
            remarks,
            detailed_status: text(&record.detailed_status).to_string(),
        }
    }

    /// Display cells in `HEADERS` order.
    pub fn cells(&self) -> [&str; 18] {
        [
            self.job_no_and_date.as_str(),
            self.importer.as_str(),
            self.supplier_exporter.as_str(),
            self.invoice_number_and_date.as_str(),
            self.invoice_value_and_unit_price.as_str(),
            self.bl_number_and_date.as_str(),
            self.commodity.as_str(),
            self.net_weight.as_str(),
            self.port.as_str(),
            self.arrival_date.as_str(),
            self.free_time.as_str(),
            self.detention_from.as_str(),
            self.shipping_line.as_str(),
            self.container_num_and_size.as_str(),
            self.no_of_containers.as_str(),
            self.be_number_and_date.as_str(),
            self.remarks.as_str(),
            self.detailed_status.as_str(),
        ]
    }
}

pub fn normalize(records: &[JobRecord]) -> JobTable {
    records.iter().map(JobRow::from_record).collect()
}

fn text(field: &Option<String>) -> &str {
    field.as_deref().unwrap_or("")
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.date());
    }
    ["%Y-%m-%d", "%d/%m/%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Render a date as `dd/mm/yyyy`; unknown formats pass through verbatim.
pub fn format_date(raw: &str) -> String {
    match parse_date(raw) {
        Some(date) => date.format("%d/%m/%Y").to_string(),
        None => raw.to_string(),
    }
}

/// Join per-container dates, collapsing to a single value when every
/// container carries the same date.
fn join_container_dates<F>(containers: &[Container], get: F) -> String
where
    F: Fn(&Container) -> Option<&str>,
{
    let dates: Vec<String> = containers
        .iter()
        .filter_map(&get)
        .filter(|d| !d.is_empty())
        .map(format_date)
        .collect();

    match dates.as_slice() {
        [] => String::new(),
        [first, rest @ ..] if rest.iter().all(|d| d == first) => first.clone(),
        _ => dates.join(",\n"),
    }
}
