//! The PostgreSQL [`Backend`](sqlmap_core::backend::Backend) implementation.
//!
//! Grounded in `asphalt_core`'s `asphalt-postgres` backend crate, but much
//! thinner: `sqlmap_core::backend::Backend` only asks a backend for its
//! placeholder syntax and identifier quoting (see `sqlmap_core::backend`'s
//! doc comment for why) rather than the teacher's full `Query`/
//! `QueryWriter`/`BindCollector` type-level machinery, so this crate's whole
//! job is [`connection::PgConnection`] plus the small `?` → `$n` rewrite
//! below.

mod connection;

#[doc(inline)]
pub use connection::{ConnectionConfig, PgConnection, PgRow};

use sqlmap_core::backend::Backend;

/// The PostgreSQL backend tag.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub struct Pg;

impl Backend for Pg {
    type RawConnection = PgConnection;

    /// Rewrites this runtime's canonical `?` placeholders into Postgres's
    /// `$1`, `$2`, ... numbered form, skipping `?` characters inside single-
    /// quoted string literals (`''` is an escaped quote, matching the
    /// teacher's `push_identifier`'s doubling convention for `"`).
    fn rewrite_placeholders(sql: &str) -> String {
        let mut out = String::with_capacity(sql.len() + 8);
        let mut in_string = false;
        let mut n = 0u32;
        let mut chars = sql.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\'' => {
                    in_string = !in_string;
                    out.push(c);
                }
                '?' if !in_string => {
                    n += 1;
                    out.push('$');
                    out.push_str(&n.to_string());
                }
                _ => out.push(c),
            }
        }
        out
    }

    fn quote_identifier(identifier: &str) -> String {
        let mut out = String::with_capacity(identifier.len() + 2);
        out.push('"');
        out.push_str(&identifier.replace('"', "\"\""));
        out.push('"');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_positional_placeholders_in_order() {
        assert_eq!(Pg::rewrite_placeholders("select * from t where a = ? and b = ?"), "select * from t where a = $1 and b = $2");
    }

    #[test]
    fn leaves_question_marks_inside_string_literals_alone() {
        assert_eq!(Pg::rewrite_placeholders("select ? , '?' from t"), "select $1 , '?' from t");
    }

    #[test]
    fn quotes_identifier_and_doubles_embedded_quotes() {
        assert_eq!(Pg::quote_identifier(r#"weird"name"#), "\"weird\"\"name\"");
    }
}
