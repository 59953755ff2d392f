//! 发票抽取结果模型

use crate::error::ExtractionError;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// 抽取服务响应必须包含的八个字段（顺序即问题上报顺序）
pub const REQUIRED_FIELDS: [&str; 8] = [
    "vendor",
    "invoiceDate",
    "dueDate",
    "invoiceNumber",
    "lineItems",
    "subtotal",
    "tax",
    "totalAmount",
];

/// 发票明细行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    #[serde(default, alias = "price")]
    pub unit_price: f64,
    #[serde(default, alias = "lineTotal", skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
}

fn default_quantity() -> f64 {
    1.0
}

impl LineItem {
    pub fn extended(&self) -> f64 {
        self.quantity * self.unit_price
    }
}

/// 一次成功抽取的结果（只读）
///
/// 必填字段使用 `Option`，这样校验层可以独立地再做一次完整性检查
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub vendor: Option<String>,
    pub invoice_date: Option<String>,
    pub due_date: Option<String>,
    pub invoice_number: Option<String>,
    pub line_items: Option<Vec<LineItem>>,
    pub subtotal: Option<f64>,
    pub tax: Option<f64>,
    pub total_amount: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
}

fn default_currency() -> Option<String> {
    Some("USD".to_string())
}

impl ExtractionResult {
    /// 从抽取服务的 JSON 对象构建结果
    ///
    /// 任一必填字段缺失（或为 null）都视为 `UpstreamMalformed`
    pub fn from_json(value: JsonValue) -> Result<Self, ExtractionError> {
        let object = value.as_object().ok_or_else(|| ExtractionError::UpstreamMalformed {
            missing: Vec::new(),
            detail: "响应不是 JSON 对象".to_string(),
        })?;

        let missing: Vec<String> = REQUIRED_FIELDS
            .iter()
            .filter(|field| object.get(**field).map_or(true, JsonValue::is_null))
            .map(|field| field.to_string())
            .collect();
        if let Some(detail) = upstream_failure(object, !missing.is_empty()) {
            return Err(ExtractionError::UpstreamMalformed { missing, detail });
        }
        if !missing.is_empty() {
            return Err(ExtractionError::missing_fields(missing));
        }

        let mut result: ExtractionResult =
            serde_json::from_value(value).map_err(|e| ExtractionError::UpstreamMalformed {
                missing: Vec::new(),
                detail: format!("字段类型错误: {}", e),
            })?;
        if result.currency.is_none() {
            result.currency = default_currency();
        }
        Ok(result)
    }

    /// 返回缺失的必填字段（按固定顺序）
    pub fn missing_required_fields(&self) -> Vec<&'static str> {
        let present = [
            self.vendor.is_some(),
            self.invoice_date.is_some(),
            self.due_date.is_some(),
            self.invoice_number.is_some(),
            self.line_items.is_some(),
            self.subtotal.is_some(),
            self.tax.is_some(),
            self.total_amount.is_some(),
        ];
        REQUIRED_FIELDS
            .iter()
            .zip(present)
            .filter(|(_, present)| !present)
            .map(|(field, _)| *field)
            .collect()
    }
}

/// 抽取服务以 2xx 报告的处理失败：`processingStatus: "Error"` 或附带 `errorMessage`
///
/// 只有状态为 Error，或必填字段不全时才采用 `errorMessage`
fn upstream_failure(
    object: &serde_json::Map<String, JsonValue>,
    incomplete: bool,
) -> Option<String> {
    let errored = object
        .get("processingStatus")
        .and_then(JsonValue::as_str)
        .is_some_and(|status| status.eq_ignore_ascii_case("error"));
    let message = object
        .get("errorMessage")
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .filter(|message| !message.is_empty());

    match message {
        Some(message) if errored || incomplete => Some(format!("抽取服务处理失败: {}", message)),
        None if errored => Some("抽取服务处理失败 (processingStatus = Error)".to_string()),
        _ => None,
    }
}
