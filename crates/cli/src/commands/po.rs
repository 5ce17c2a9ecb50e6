//! Purchase-order document rendering.
//!
//! A purchase order is formatted entirely from the fields of an already-loaded
//! approved request; nothing here talks to the network. The HTML template is
//! embedded so the binary renders the same document everywhere.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tera::{Context, Tera};
use thiserror::Error;

use payflow_core::{PurchaseRequest, RequestStatus};

#[derive(Debug, Error)]
pub enum PoError {
    #[error("purchase orders exist only for approved requests; request is {0}")]
    NotApproved(RequestStatus),
    #[error("template error: {0}")]
    Template(String),
}

pub struct PurchaseOrderRenderer {
    tera: Tera,
}

impl Default for PurchaseOrderRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Two-decimal money rendering for amounts that arrive as strings or numbers.
/// Usage: `{{ request.amount | money }}`
fn tera_money_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let num = match value {
        tera::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        tera::Value::String(raw) => raw.parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    Ok(tera::Value::String(format!("{num:.2}")))
}

impl PurchaseOrderRenderer {
    pub fn new() -> Self {
        let mut tera = Tera::default();
        tera.register_filter("money", tera_money_filter);
        tera.add_raw_template(
            "purchase_order.html.tera",
            include_str!("../../templates/purchase_order.html.tera"),
        )
        .expect("embedded purchase order template must parse");
        Self { tera }
    }

    pub fn render(
        &self,
        request: &PurchaseRequest,
        generated_at: DateTime<Utc>,
    ) -> Result<String, PoError> {
        if request.status != RequestStatus::Approved {
            return Err(PoError::NotApproved(request.status));
        }

        let mut context = Context::new();
        context.insert("request", request);
        context.insert("generated_at", &generated_at.to_rfc3339());
        context.insert(
            "approved_at",
            &request.approved_at.map(|at| at.to_rfc3339()).unwrap_or_default(),
        );

        self.tera
            .render("purchase_order.html.tera", &context)
            .map_err(|error| PoError::Template(error.to_string()))
    }
}
