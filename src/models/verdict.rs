use serde::{Deserialize, Serialize};

/// 校验问题类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    MissingField,
    SubtotalMismatch,
    TotalMismatch,
    DateFormat,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingField => "missing-field",
            Self::SubtotalMismatch => "subtotal-mismatch",
            Self::TotalMismatch => "total-mismatch",
            Self::DateFormat => "date-format",
        }
    }
}

/// 单条校验问题
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

/// 校验结论：问题列表为空即通过
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationVerdict {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn has(&self, kind: IssueKind) -> bool {
        self.issues.iter().any(|issue| issue.kind == kind)
    }

    pub fn kinds(&self) -> Vec<IssueKind> {
        self.issues.iter().map(|issue| issue.kind).collect()
    }

    pub(crate) fn push(&mut self, kind: IssueKind, field: Option<&str>, message: String) {
        self.issues.push(ValidationIssue {
            kind,
            field: field.map(str::to_string),
            message,
        });
    }
}
