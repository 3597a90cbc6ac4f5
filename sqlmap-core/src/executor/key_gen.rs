//! Key generators (`spec.md` §4.6.1): write auto-generated identifiers back
//! into the input parameter, either by reading the driver's own
//! generated-keys result set (Jdbc3-style) or by running a peer statement
//! before/after the owning one (SelectKey-style).
//!
//! No teacher counterpart — `asphalt_core` leaves key retrieval to its
//! typed query DSL's `RETURNING` support — so this is grounded in
//! `RawConnection::execute_returning_keys` (`connection/mod.rs`), built the
//! same way the rest of this runtime's executor seams are: a small
//! object-safe trait returning a manually boxed future, mirroring
//! `asphalt_core`'s `TransactionManager` shape rather than pulling in
//! `async-trait`.

use futures_util::future::BoxFuture;

use crate::error::ExecutorError;
use crate::reflect;
use crate::value::Value;

/// When a [`KeyGenerator`] needs to run relative to the owning statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorOrder {
    Before,
    After,
    /// Jdbc3-style generators ride along with the statement's own execute
    /// call rather than running as a separate step.
    Inline,
}

/// One row of a driver's generated-keys result set, already unpacked from
/// `Conn::Row` by the executor so this module stays connection-type-free.
#[derive(Debug, Clone, Default)]
pub struct GeneratedKeyRow {
    pub columns: Vec<(String, Value)>,
}

impl GeneratedKeyRow {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns.iter().find(|(col, _)| col == name).map(|(_, v)| v)
    }
}

/// Callback the executor hands a [`KeyGenerator`] so a SelectKey-style
/// generator can run its peer statement without this module depending on
/// the rest of the executor.
pub trait PeerStatementRunner: Send + Sync {
    /// Executes the peer statement `id` with `parameter`, returning its
    /// first result row (as a plain object), if any.
    fn run_select<'a>(
        &'a self,
        id: &'a str,
        parameter: &'a Value,
    ) -> BoxFuture<'a, Result<Option<Value>, ExecutorError>>;
}

/// Writes generated key values back onto an input parameter, before or
/// after the owning statement executes.
pub trait KeyGenerator: Send + Sync {
    fn order(&self) -> GeneratorOrder;

    /// Runs before the owning statement executes (`selectKey order="BEFORE"`).
    fn process_before<'a>(
        &'a self,
        runner: &'a dyn PeerStatementRunner,
        parameter: &'a mut Value,
    ) -> BoxFuture<'a, Result<(), ExecutorError>> {
        let _ = (runner, parameter);
        Box::pin(async { Ok(()) })
    }

    /// Runs after the owning statement executes. Jdbc3-style generators
    /// read `generated_keys` (the driver's own report); SelectKey-style
    /// (`order="AFTER"`) generators drive `runner` instead and ignore it.
    fn process_after<'a>(
        &'a self,
        runner: &'a dyn PeerStatementRunner,
        parameter: &'a mut Value,
        generated_keys: &'a [GeneratedKeyRow],
    ) -> BoxFuture<'a, Result<(), ExecutorError>>;
}

/// No key generation configured (`spec.md` §6 default when
/// `useGeneratedKeys` is unset and no `<selectKey>` child is present).
pub struct NoKeyGenerator;

impl KeyGenerator for NoKeyGenerator {
    fn order(&self) -> GeneratorOrder {
        GeneratorOrder::Inline
    }

    fn process_after<'a>(
        &'a self,
        _runner: &'a dyn PeerStatementRunner,
        _parameter: &'a mut Value,
        _generated_keys: &'a [GeneratedKeyRow],
    ) -> BoxFuture<'a, Result<(), ExecutorError>> {
        Box::pin(async { Ok(()) })
    }
}

fn write_back(parameter: &mut Value, property: &str, value: Value) -> Result<(), ExecutorError> {
    reflect::set_path(parameter, property, value)
        .map_err(|e| ExecutorError::KeyWriteback { property: property.to_owned(), reason: e.to_string() })
}

/// Reads auto-generated keys the driver reported back from
/// `execute_returning_keys`, and binds them to the declared `keyProperty`
/// paths (`spec.md` §4.6.1): a single scalar/structure parameter, a map of
/// named parameters (paths may be prefixed by the parameter name, e.g.
/// `user.id`), or a batch (a list of inputs, one generated-keys row per
/// input, in order).
pub struct Jdbc3KeyGenerator {
    pub key_properties: Vec<String>,
    pub key_columns: Vec<String>,
}

impl Jdbc3KeyGenerator {
    pub fn new(key_properties: Vec<String>, key_columns: Vec<String>) -> Self {
        Self { key_properties, key_columns }
    }

    fn assign_row(&self, target: &mut Value, row: &GeneratedKeyRow) -> Result<(), ExecutorError> {
        for (i, property) in self.key_properties.iter().enumerate() {
            let column = self.key_columns.get(i).unwrap_or(property);
            let Some(value) = row.get(column) else { continue };
            write_back(target, property, value.clone())?;
        }
        Ok(())
    }
}

impl KeyGenerator for Jdbc3KeyGenerator {
    fn order(&self) -> GeneratorOrder {
        GeneratorOrder::Inline
    }

    fn process_after<'a>(
        &'a self,
        _runner: &'a dyn PeerStatementRunner,
        parameter: &'a mut Value,
        generated_keys: &'a [GeneratedKeyRow],
    ) -> BoxFuture<'a, Result<(), ExecutorError>> {
        Box::pin(async move {
            if self.key_properties.is_empty() || generated_keys.is_empty() {
                return Ok(());
            }
            match parameter {
                Value::Array(items) => {
                    // Batch: one generated-keys row per input, in order.
                    for (item, row) in items.iter_mut().zip(generated_keys) {
                        self.assign_row(item, row)?;
                    }
                }
                other => self.assign_row(other, &generated_keys[0])?,
            }
            Ok(())
        })
    }
}

/// Runs a peer `<selectKey>` statement before or after the owning one and
/// writes its selected columns to the declared properties (`spec.md`
/// §4.6.1).
pub struct SelectKeyGenerator {
    pub statement_id: String,
    pub order: GeneratorOrder,
    pub key_properties: Vec<String>,
    pub key_columns: Vec<String>,
}

impl SelectKeyGenerator {
    pub fn new(
        statement_id: impl Into<String>,
        order: GeneratorOrder,
        key_properties: Vec<String>,
        key_columns: Vec<String>,
    ) -> Self {
        Self { statement_id: statement_id.into(), order, key_properties, key_columns }
    }

    async fn run(
        &self,
        runner: &dyn PeerStatementRunner,
        parameter: &mut Value,
    ) -> Result<(), ExecutorError> {
        let Some(row) = runner.run_select(&self.statement_id, parameter).await? else {
            return Ok(());
        };
        for (i, property) in self.key_properties.iter().enumerate() {
            let column = self.key_columns.get(i).unwrap_or(property);
            let value = reflect::get_path(&row, column, false).unwrap_or(Value::Null);
            write_back(parameter, property, value)?;
        }
        Ok(())
    }
}

impl KeyGenerator for SelectKeyGenerator {
    fn order(&self) -> GeneratorOrder {
        self.order
    }

    fn process_before<'a>(
        &'a self,
        runner: &'a dyn PeerStatementRunner,
        parameter: &'a mut Value,
    ) -> BoxFuture<'a, Result<(), ExecutorError>> {
        Box::pin(async move {
            if self.order == GeneratorOrder::Before {
                self.run(runner, parameter).await?;
            }
            Ok(())
        })
    }

    fn process_after<'a>(
        &'a self,
        runner: &'a dyn PeerStatementRunner,
        parameter: &'a mut Value,
        _generated_keys: &'a [GeneratedKeyRow],
    ) -> BoxFuture<'a, Result<(), ExecutorError>> {
        Box::pin(async move {
            if self.order == GeneratorOrder::After {
                self.run(runner, parameter).await?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubRunner(Value);

    impl PeerStatementRunner for StubRunner {
        fn run_select<'a>(
            &'a self,
            _id: &'a str,
            _parameter: &'a Value,
        ) -> BoxFuture<'a, Result<Option<Value>, ExecutorError>> {
            let row = self.0.clone();
            Box::pin(async move { Ok(Some(row)) })
        }
    }

    #[tokio::test]
    async fn jdbc3_writes_scalar_key_back() {
        let gen = Jdbc3KeyGenerator::new(vec!["id".into()], vec!["id".into()]);
        let mut parameter = Value::object([("name".into(), serde_json::json!("A"))]);
        let rows = vec![GeneratedKeyRow { columns: vec![("id".into(), Value::I64(42))] }];
        let runner = StubRunner(Value::Null);
        gen.process_after(&runner, &mut parameter, &rows).await.unwrap();
        assert_eq!(reflect::get_path(&parameter, "id", false), Some(Value::I64(42)));
    }

    #[tokio::test]
    async fn jdbc3_writes_one_row_per_batch_item() {
        let gen = Jdbc3KeyGenerator::new(vec!["id".into()], vec!["id".into()]);
        let mut parameter = Value::Array(vec![
            Value::object([("name".into(), serde_json::json!("A"))]),
            Value::object([("name".into(), serde_json::json!("B"))]),
        ]);
        let rows = vec![
            GeneratedKeyRow { columns: vec![("id".into(), Value::I64(1))] },
            GeneratedKeyRow { columns: vec![("id".into(), Value::I64(2))] },
        ];
        let runner = StubRunner(Value::Null);
        gen.process_after(&runner, &mut parameter, &rows).await.unwrap();
        let Value::Array(items) = parameter else { panic!("expected array") };
        assert_eq!(reflect::get_path(&items[0], "id", false), Some(Value::I64(1)));
        assert_eq!(reflect::get_path(&items[1], "id", false), Some(Value::I64(2)));
    }

    #[tokio::test]
    async fn select_key_before_runs_ahead_of_the_statement() {
        let gen = SelectKeyGenerator::new(
            "ns.nextId",
            GeneratorOrder::Before,
            vec!["id".into()],
            vec!["id".into()],
        );
        let mut parameter = Value::object([("name".into(), serde_json::json!("A"))]);
        let runner = StubRunner(Value::object([("id".into(), serde_json::json!(7))]));
        gen.process_before(&runner, &mut parameter).await.unwrap();
        assert_eq!(reflect::get_path(&parameter, "id", false), Some(Value::I64(7)));
    }
}
