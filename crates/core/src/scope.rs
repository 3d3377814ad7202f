//! Tenant scoping: the optional college / department filter applied to
//! list queries, plus lenient integer parsing for ids arriving from the
//! browser client as numbers, numeric strings, or empty strings.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{TimetableError, TimetableResult};
use crate::types::DbId;

/// Progressive scope: no filter, a college, or a college narrowed to a
/// department. A department without a college narrows by department only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeFilter {
    pub college_id: Option<DbId>,
    pub department_id: Option<DbId>,
}

impl ScopeFilter {
    pub fn unscoped() -> Self {
        Self::default()
    }

    pub fn college(college_id: DbId) -> Self {
        Self {
            college_id: Some(college_id),
            department_id: None,
        }
    }

    pub fn new(college_id: Option<DbId>, department_id: Option<DbId>) -> Self {
        Self {
            college_id,
            department_id,
        }
    }

    /// Parse raw query-string values. Absent or empty values mean "no filter".
    pub fn from_params(college: Option<&str>, department: Option<&str>) -> TimetableResult<Self> {
        Ok(Self {
            college_id: parse_optional_id("college_id", college)?,
            department_id: parse_optional_id("department_id", department)?,
        })
    }

    pub fn is_unscoped(&self) -> bool {
        self.college_id.is_none() && self.department_id.is_none()
    }

    /// Whether a row owned by `(college_id, department_id)` falls in scope.
    pub fn matches(&self, college_id: Option<DbId>, department_id: Option<DbId>) -> bool {
        let college_ok = self.college_id.map_or(true, |c| college_id == Some(c));
        let department_ok = self.department_id.map_or(true, |d| department_id == Some(d));
        college_ok && department_ok
    }

    /// Human-readable scope label used in error messages and logs.
    pub fn describe(&self) -> String {
        match (self.college_id, self.department_id) {
            (None, None) => "all colleges".to_string(),
            (Some(c), None) => format!("College {c}"),
            (None, Some(d)) => format!("Department {d}"),
            (Some(c), Some(d)) => format!("College {c}, Department {d}"),
        }
    }
}

/// Raw `?college_id=&department_id=` query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScopeParams {
    pub college_id: Option<String>,
    pub department_id: Option<String>,
}

impl ScopeParams {
    pub fn into_filter(self) -> TimetableResult<ScopeFilter> {
        ScopeFilter::from_params(self.college_id.as_deref(), self.department_id.as_deref())
    }
}

/// Parse an optional integer id; blank input is `None`.
pub fn parse_optional_id(field: &str, raw: Option<&str>) -> TimetableResult<Option<DbId>> {
    match raw.map(str::trim) {
        None | Some("") | Some("null") | Some("undefined") => Ok(None),
        Some(value) => value
            .parse::<DbId>()
            .map(Some)
            .map_err(|_| TimetableError::validation(format!("{field} must be an integer"))),
    }
}

/// Serde helper: accept `3`, `"3"`, `null`, or `""` for an optional integer.
pub fn lenient_int<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Text(String),
    }

    let raw = Option::<Raw>::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(Raw::Int(n)) => i32::try_from(n)
            .map(Some)
            .map_err(|_| serde::de::Error::custom("integer out of range")),
        Some(Raw::Float(f)) if f.fract() == 0.0 && f.abs() <= i32::MAX as f64 => Ok(Some(f as i32)),
        Some(Raw::Float(_)) => Err(serde::de::Error::custom("expected an integer")),
        Some(Raw::Text(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else {
                trimmed
                    .parse::<i32>()
                    .map(Some)
                    .map_err(|_| serde::de::Error::custom(format!("expected an integer, got {s:?}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Body {
        #[serde(default, deserialize_with = "lenient_int")]
        semester: Option<i32>,
    }

    #[test]
    fn test_from_params() {
        let scope = ScopeFilter::from_params(Some("2"), Some("")).unwrap();
        assert_eq!(scope, ScopeFilter::college(2));

        let scope = ScopeFilter::from_params(None, None).unwrap();
        assert!(scope.is_unscoped());

        let scope = ScopeFilter::from_params(Some(" 4 "), Some("9")).unwrap();
        assert_eq!(scope, ScopeFilter::new(Some(4), Some(9)));

        let err = ScopeFilter::from_params(Some("1 OR 1=1"), None).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_string(), "college_id must be an integer");
    }

    #[test]
    fn test_matches_progressively() {
        let all = ScopeFilter::unscoped();
        assert!(all.matches(Some(1), Some(2)));
        assert!(all.matches(None, None));

        let college = ScopeFilter::college(1);
        assert!(college.matches(Some(1), Some(2)));
        assert!(college.matches(Some(1), None));
        assert!(!college.matches(Some(2), Some(2)));

        let dept = ScopeFilter::new(Some(1), Some(2));
        assert!(dept.matches(Some(1), Some(2)));
        assert!(!dept.matches(Some(1), Some(3)));
        assert!(!dept.matches(Some(1), None));
    }

    #[test]
    fn test_describe() {
        assert_eq!(ScopeFilter::unscoped().describe(), "all colleges");
        assert_eq!(ScopeFilter::new(Some(1), Some(4)).describe(), "College 1, Department 4");
    }

    #[test]
    fn test_lenient_int() {
        let parse = |json: &str| serde_json::from_str::<Body>(json).map(|b| b.semester);
        assert_eq!(parse(r#"{"semester": 3}"#).unwrap(), Some(3));
        assert_eq!(parse(r#"{"semester": "5"}"#).unwrap(), Some(5));
        assert_eq!(parse(r#"{"semester": ""}"#).unwrap(), None);
        assert_eq!(parse(r#"{"semester": null}"#).unwrap(), None);
        assert_eq!(parse(r#"{}"#).unwrap(), None);
        assert!(parse(r#"{"semester": "three"}"#).is_err());
        assert!(parse(r#"{"semester": 2.5}"#).is_err());
    }
}
