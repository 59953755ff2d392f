//! 抽取结果一致性校验 - 业务能力层
//!
//! 纯函数：同一个结果永远得到同一份结论，不做任何 I/O。

use crate::models::invoice::ExtractionResult;
use crate::models::verdict::{IssueKind, ValidationVerdict};
use regex::Regex;
use std::sync::OnceLock;

/// 金额允许的绝对误差（货币单位）
pub const TOLERANCE: f64 = 0.01;

/// 浮点比较余量，避免 0.01 边界因舍入被误判
const EPSILON: f64 = 1e-9;

/// 只接受 ASCII 数字
const DATE_PATTERN: &str = r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$";

/// 抽取结果校验器
///
/// 职责：
/// - 按固定顺序执行全部检查（不短路）
/// - 只报告问题，不修正数据
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseValidator;

impl ResponseValidator {
    pub fn new() -> Self {
        Self
    }

    /// 校验单个抽取结果
    ///
    /// 检查顺序：
    /// 1. 必填字段完整性（每个缺失字段一条 `missing-field`）
    /// 2. 小计 = Σ 数量 × 单价
    /// 3. 总额 = 小计 + 税额
    /// 4. 开票日期 / 到期日期为 `YYYY-MM-DD`
    ///
    /// 某项检查所需字段缺失时跳过该项，缺失本身已在第 1 步报告
    pub fn validate(&self, result: &ExtractionResult) -> ValidationVerdict {
        let mut verdict = ValidationVerdict::default();

        check_required_fields(result, &mut verdict);
        check_subtotal(result, &mut verdict);
        check_total(result, &mut verdict);
        check_dates(result, &mut verdict);

        verdict
    }
}

fn check_required_fields(result: &ExtractionResult, verdict: &mut ValidationVerdict) {
    for field in result.missing_required_fields() {
        verdict.push(
            IssueKind::MissingField,
            Some(field),
            format!("缺少必填字段 {}", field),
        );
    }
}

fn check_subtotal(result: &ExtractionResult, verdict: &mut ValidationVerdict) {
    let (Some(subtotal), Some(items)) = (result.subtotal, result.line_items.as_ref()) else {
        return;
    };

    let expected: f64 = items.iter().map(|item| item.extended()).sum();
    if !within_tolerance(subtotal, expected) {
        verdict.push(
            IssueKind::SubtotalMismatch,
            Some("subtotal"),
            format!(
                "小计 {:.2} 与明细合计 {:.2} 不一致 (差额 {:.2})",
                subtotal,
                expected,
                subtotal - expected
            ),
        );
    }
}

fn check_total(result: &ExtractionResult, verdict: &mut ValidationVerdict) {
    let (Some(total), Some(subtotal), Some(tax)) =
        (result.total_amount, result.subtotal, result.tax)
    else {
        return;
    };

    let expected = subtotal + tax;
    if !within_tolerance(total, expected) {
        verdict.push(
            IssueKind::TotalMismatch,
            Some("totalAmount"),
            format!(
                "总额 {:.2} 与 小计 + 税额 ({:.2}) 不一致 (差额 {:.2})",
                total,
                expected,
                total - expected
            ),
        );
    }
}

fn check_dates(result: &ExtractionResult, verdict: &mut ValidationVerdict) {
    let dates = [
        ("invoiceDate", result.invoice_date.as_deref()),
        ("dueDate", result.due_date.as_deref()),
    ];

    for (field, value) in dates {
        let Some(value) = value else {
            continue;
        };
        if !is_iso_date(value) {
            verdict.push(
                IssueKind::DateFormat,
                Some(field),
                format!("{} 的值 \"{}\" 不是 YYYY-MM-DD 格式", field, value),
            );
        }
    }
}

fn within_tolerance(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() <= TOLERANCE + EPSILON
}

/// 只检查格式，不检查日期是否真实存在
fn is_iso_date(value: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(DATE_PATTERN).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(value))
}
