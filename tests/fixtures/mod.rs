//! Canned job list payloads served by the fake remote service.

#![allow(dead_code)]

use serde_json::{json, Value};

/// A pending job as the service lists it.
#[derive(Debug, Clone)]
pub struct JobFixture {
    pub id: i64,
    pub tracking_code: &'static str,
    pub order_number: &'static str,
    /// Label path on the fake service, e.g. "a.zpl".
    pub label: Option<&'static str>,
    pub label_format: &'static str,
    pub printer_name: Option<&'static str>,
}

pub const ZPL_JOB: JobFixture = JobFixture {
    id: 1,
    tracking_code: "1Z999AA10123456784",
    order_number: "ORD-1001",
    label: Some("a.zpl"),
    label_format: "zpl",
    printer_name: None,
};

pub const PDF_JOB: JobFixture = JobFixture {
    id: 2,
    tracking_code: "9400111899223197428490",
    order_number: "ORD-1002",
    label: Some("document"),
    label_format: "pdf",
    printer_name: Some("Office_Laser"),
};

pub const MISSING_LABEL_JOB: JobFixture = JobFixture {
    id: 3,
    tracking_code: "",
    order_number: "ORD-1003",
    label: Some("missing.zpl"),
    label_format: "zpl",
    printer_name: None,
};

pub const NO_URL_JOB: JobFixture = JobFixture {
    id: 4,
    tracking_code: "",
    order_number: "ORD-1004",
    label: None,
    label_format: "zpl",
    printer_name: None,
};

impl JobFixture {
    pub fn to_json(&self, base_url: &str) -> Value {
        let mut job = json!({
            "id": self.id,
            "trackingCode": self.tracking_code,
            "orderNumber": self.order_number,
            "labelFormat": self.label_format,
        });
        if let Some(label) = self.label {
            job["labelUrl"] = json!(format!("{}/labels/{}", base_url, label));
        }
        if let Some(printer) = self.printer_name {
            job["printerName"] = json!(printer);
        }
        job
    }
}

/// Full `GET /api/agent/jobs` body.
pub fn jobs_body(base_url: &str, jobs: &[JobFixture], default_printer: Option<&str>) -> Value {
    let mut settings = json!({});
    if let Some(printer) = default_printer {
        settings["defaultPrinterName"] = json!(printer);
    }
    json!({
        "jobs": jobs.iter().map(|j| j.to_json(base_url)).collect::<Vec<_>>(),
        "settings": settings,
    })
}
