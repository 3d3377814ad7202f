//! Predicate composition for scoped list queries. Filter values are always
//! pushed as bind parameters, never into the SQL text.

use sqlx::{Encode, Postgres, QueryBuilder, Type};
use timetable_core::ScopeFilter;

/// Column names carrying the scoping pair in a query.
#[derive(Debug, Clone, Copy)]
pub struct ScopeColumns {
    pub college: &'static str,
    pub department: &'static str,
}

impl ScopeColumns {
    pub const fn new(college: &'static str, department: &'static str) -> Self {
        Self { college, department }
    }
}

pub struct ScopedQuery<'args> {
    builder: QueryBuilder<'args, Postgres>,
    has_predicate: bool,
}

impl<'args> ScopedQuery<'args> {
    /// Start from a `SELECT ... FROM ...` with no `WHERE` clause.
    pub fn new(base: &str) -> Self {
        Self {
            builder: QueryBuilder::new(base),
            has_predicate: false,
        }
    }

    fn push_connector(&mut self) {
        if self.has_predicate {
            self.builder.push(" AND ");
        } else {
            self.builder.push(" WHERE ");
            self.has_predicate = true;
        }
    }

    pub fn and_eq<T>(&mut self, column: &'static str, value: T) -> &mut Self
    where
        T: 'args + Encode<'args, Postgres> + Send + Type<Postgres>,
    {
        self.push_connector();
        self.builder.push(column).push(" = ").push_bind(value);
        self
    }

    /// Adds the predicate only when `value` is present.
    pub fn and_opt_eq<T>(&mut self, column: &'static str, value: Option<T>) -> &mut Self
    where
        T: 'args + Encode<'args, Postgres> + Send + Type<Postgres>,
    {
        match value {
            Some(value) => self.and_eq(column, value),
            None => self,
        }
    }

    /// Progressive scoping: college, then department, each optional.
    pub fn scoped(&mut self, columns: ScopeColumns, scope: &ScopeFilter) -> &mut Self {
        self.and_opt_eq(columns.college, scope.college_id)
            .and_opt_eq(columns.department, scope.department_id)
    }

    pub fn order_by(&mut self, clause: &'static str) -> &mut Self {
        self.builder.push(" ORDER BY ").push(clause);
        self
    }

    pub fn sql(&self) -> &str {
        self.builder.sql()
    }

    pub fn into_builder(self) -> QueryBuilder<'args, Postgres> {
        self.builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COURSE_SCOPE: ScopeColumns = ScopeColumns::new("college_id", "department_id");

    #[test]
    fn test_unscoped_has_no_where() {
        let mut query = ScopedQuery::new("SELECT * FROM courses");
        query.scoped(COURSE_SCOPE, &ScopeFilter::unscoped()).order_by("id");
        assert_eq!(query.sql(), "SELECT * FROM courses ORDER BY id");
    }

    #[test]
    fn test_progressive_scope_uses_placeholders() {
        let mut query = ScopedQuery::new("SELECT * FROM courses");
        query.scoped(COURSE_SCOPE, &ScopeFilter::new(Some(3), Some(11)));
        assert_eq!(
            query.sql(),
            "SELECT * FROM courses WHERE college_id = $1 AND department_id = $2"
        );
        assert!(!query.sql().contains('3'));
        assert!(!query.sql().contains("11"));
    }

    #[test]
    fn test_department_without_college() {
        let mut query = ScopedQuery::new("SELECT * FROM faculty");
        query
            .and_eq("role", "faculty")
            .scoped(COURSE_SCOPE, &ScopeFilter::new(None, Some(5)));
        assert_eq!(
            query.sql(),
            "SELECT * FROM faculty WHERE role = $1 AND department_id = $2"
        );
        assert!(!query.sql().contains("'faculty'"));
    }

    #[test]
    fn test_hostile_text_stays_out_of_sql() {
        let hostile = "x' OR '1'='1".to_string();
        let mut query = ScopedQuery::new("SELECT * FROM time_slots");
        query.and_eq("day", hostile);
        assert_eq!(query.sql(), "SELECT * FROM time_slots WHERE day = $1");
    }
}
