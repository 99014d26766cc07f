//! SQLite DAO - CRUD over mapped types through the connection pool

use std::path::Path;
use crate::entity::{Entity, TableMeta};
use crate::value::Value;
use crate::Result;
use super::materialize::{self, RawRow};
use super::pool::{ConnectionPool, PoolConfig};
use super::statement::{self, PreparedOperation};
use super::schema;

/// Data access object for any [`Entity`] stored in SQLite.
///
/// Every call checks out one pooled connection for its whole duration and
/// releases it before returning, whatever the outcome. The DAO holds no other
/// state, so clones can be used from many threads at once.
#[derive(Clone)]
pub struct SqliteDao {
    pool: ConnectionPool,
}

impl SqliteDao {
    /// Wrap an externally built pool
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path, config: &PoolConfig) -> Result<Self> {
        Ok(Self::new(ConnectionPool::open(path, config)?))
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(ConnectionPool::open_in_memory()?))
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    // ========== Execution ==========

    fn execute(&self, op: &PreparedOperation) -> Result<usize> {
        tracing::debug!(sql = %op.sql, params = op.params.len(), "execute");
        let conn = self.pool.acquire()?;
        let affected = conn.execute(&op.sql, rusqlite::params_from_iter(op.params.iter()))?;
        Ok(affected)
    }

    fn fetch(&self, op: &PreparedOperation) -> Result<Vec<RawRow>> {
        tracing::debug!(sql = %op.sql, params = op.params.len(), "query");
        let conn = self.pool.acquire()?;
        let mut stmt = conn.prepare(&op.sql)?;
        materialize::collect_rows(&mut stmt, &op.params)
    }

    // ========== Schema ==========

    /// Create every missing table. Existing tables are left untouched.
    ///
    /// Every table's DDL is built before the first statement runs, so a schema
    /// error in any of them leaves the database unchanged.
    pub fn init_schema(&self, tables: &[TableMeta]) -> Result<()> {
        let statements = tables
            .iter()
            .map(|meta| Ok((meta.name.as_str(), schema::create_table_sql(meta)?)))
            .collect::<Result<Vec<_>>>()?;

        for (table, ddl) in &statements {
            tracing::info!(table = %table, "ensuring table");
            self.execute(&statement::raw(ddl))?;
        }
        Ok(())
    }

    /// Create the table for `T` if it does not exist
    pub fn init_table<T: Entity>(&self) -> Result<()> {
        self.init_schema(&[TableMeta::of::<T>()?])
    }

    // ========== Writes ==========

    /// Insert one new row and return its row id
    pub fn insert<T: Entity>(&self, instance: &T) -> Result<i64> {
        let meta = TableMeta::of::<T>()?;
        let op = statement::insert(&meta, instance)?;
        tracing::debug!(sql = %op.sql, params = op.params.len(), "execute");

        let conn = self.pool.acquire()?;
        conn.execute(&op.sql, rusqlite::params_from_iter(op.params.iter()))?;
        Ok(conn.last_insert_rowid())
    }

    /// Insert each instance in order.
    ///
    /// Not atomic: on failure the rows inserted so far stay committed and the
    /// error is returned.
    pub fn insert_batch<T: Entity>(&self, instances: &[T]) -> Result<usize> {
        for (index, instance) in instances.iter().enumerate() {
            if let Err(e) = self.insert(instance) {
                tracing::warn!(index, "batch insert aborted: {}", e);
                return Err(e);
            }
        }
        Ok(instances.len())
    }

    /// Insert the instance, or overwrite the non-key columns of the row that
    /// already holds its primary key. Other constraint clashes are errors.
    pub fn upsert<T: Entity>(&self, instance: &T) -> Result<()> {
        let meta = TableMeta::of::<T>()?;
        self.execute(&statement::upsert(&meta, instance)?)?;
        Ok(())
    }

    /// Upsert each instance in order; same partial-failure behavior as `insert_batch`
    pub fn upsert_batch<T: Entity>(&self, instances: &[T]) -> Result<usize> {
        for (index, instance) in instances.iter().enumerate() {
            if let Err(e) = self.upsert(instance) {
                tracing::warn!(index, "batch upsert aborted: {}", e);
                return Err(e);
            }
        }
        Ok(instances.len())
    }

    /// Overwrite every non-key column of the row with the given id.
    /// Returns 0 when no such row exists.
    pub fn update_by_id<T: Entity>(&self, id: impl Into<Value>, instance: &T) -> Result<usize> {
        let meta = TableMeta::of::<T>()?;
        self.execute(&statement::update_by_id(&meta, id.into(), instance)?)
    }

    // ========== Deletes ==========

    pub fn delete_by_id<T: Entity>(&self, id: impl Into<Value>) -> Result<usize> {
        let meta = TableMeta::of::<T>()?;
        self.execute(&statement::delete_by_id(&meta, id.into())?)
    }

    /// Delete the row whose primary key matches the instance's
    pub fn delete_by_instance<T: Entity>(&self, instance: &T) -> Result<usize> {
        let meta = TableMeta::of::<T>()?;
        self.execute(&statement::delete_by_instance(&meta, instance)?)
    }

    pub fn delete_by_column<T: Entity>(&self, column: &str, value: impl Into<Value>) -> Result<usize> {
        let meta = TableMeta::of::<T>()?;
        self.execute(&statement::delete_by_column(&meta, column, value.into())?)
    }

    pub fn delete_all<T: Entity>(&self) -> Result<usize> {
        let meta = TableMeta::of::<T>()?;
        self.execute(&statement::delete_all(&meta))
    }

    // ========== Reads ==========

    /// Get one instance by primary key, `None` when absent
    pub fn read_by_id<T: Entity>(&self, id: impl Into<Value>) -> Result<Option<T>> {
        let meta = TableMeta::of::<T>()?;
        let rows = self.fetch(&statement::select_by_id(&meta, id.into())?)?;
        rows.first()
            .map(|row| materialize::materialize(row, &meta))
            .transpose()
    }

    /// Every row of `T`'s table, in result-set order
    pub fn read_all<T: Entity>(&self) -> Result<Vec<T>> {
        let meta = TableMeta::of::<T>()?;
        let rows = self.fetch(&statement::select_all(&meta))?;
        materialize::materialize_all(&rows, &meta)
    }

    /// Rows where each column equals the value at the same position
    pub fn query_by_columns<T: Entity>(&self, columns: &[&str], values: &[Value]) -> Result<Vec<T>> {
        let meta = TableMeta::of::<T>()?;
        let rows = self.fetch(&statement::select_by_columns(&meta, columns, values)?)?;
        materialize::materialize_all(&rows, &meta)
    }

    /// Run caller-supplied SQL and materialize the result as `T`.
    ///
    /// The SQL is passed through untouched; the caller is responsible for
    /// its safety. Every mapped column must be present in the result.
    pub fn query_typed<T: Entity>(&self, sql: &str) -> Result<Vec<T>> {
        let meta = TableMeta::of::<T>()?;
        let rows = self.fetch(&statement::raw(sql))?;
        materialize::materialize_all(&rows, &meta)
    }

    /// Run caller-supplied SQL and return rows keyed by reported column name
    pub fn query_raw(&self, sql: &str) -> Result<Vec<RawRow>> {
        self.fetch(&statement::raw(sql))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::tests::{Audit, Document};
    use crate::entity::{FieldDescriptor, Shape};
    use crate::Error;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct User {
        id: Option<i64>,
        name: String,
        active: bool,
    }

    impl User {
        fn named(name: &str, active: bool) -> Self {
            Self {
                id: None,
                name: name.to_string(),
                active,
            }
        }
    }

    impl Entity for User {
        fn shapes() -> Vec<Shape> {
            vec![Shape::new("User")
                .field(FieldDescriptor::of::<Option<i64>>("id").primary_key().auto_increment())
                .field(FieldDescriptor::of::<String>("name").not_null())
                .field(FieldDescriptor::of::<bool>("active"))]
        }

        fn get_field(&self, field: &str) -> Option<Value> {
            match field {
                "id" => Some(self.id.into()),
                "name" => Some(self.name.as_str().into()),
                "active" => Some(self.active.into()),
                _ => None,
            }
        }

        fn set_field(&mut self, field: &str, value: Value) -> Result<()> {
            match field {
                "id" => self.id = value.decode()?,
                "name" => self.name = value.decode()?,
                "active" => self.active = value.decode()?,
                other => return Err(Error::unknown_field::<Self>(other)),
            }
            Ok(())
        }
    }

    fn user_dao() -> SqliteDao {
        let dao = SqliteDao::open_in_memory().unwrap();
        dao.init_table::<User>().unwrap();
        dao
    }

    fn document(uid: &str, title: &str) -> Document {
        Document {
            uid: Some(uid.to_string()),
            title: title.to_string(),
            score: 1.5,
            cached_len: 0,
            audit: Audit {
                created_by: "ann".into(),
                revision: 1,
            },
        }
    }

    fn document_dao() -> SqliteDao {
        let dao = SqliteDao::open_in_memory().unwrap();
        dao.init_table::<Document>().unwrap();
        dao
    }

    #[test]
    fn test_user_scenario() {
        let dao = user_dao();

        assert_eq!(
            schema::create_table_sql(&TableMeta::of::<User>().unwrap()).unwrap(),
            "CREATE TABLE IF NOT EXISTS User (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, active INTEGER);"
        );

        let id = dao.insert(&User::named("Ann", true)).unwrap();
        assert_eq!(id, 1);
        let ann: User = dao.read_by_id(1i64).unwrap().unwrap();
        assert_eq!(
            ann,
            User {
                id: Some(1),
                name: "Ann".into(),
                active: true
            }
        );

        assert_eq!(dao.delete_by_id::<User>(1i64).unwrap(), 1);
        assert!(dao.read_by_id::<User>(1i64).unwrap().is_none());

        let inserted = dao
            .insert_batch(&[User::named("A", false), User::named("B", false)])
            .unwrap();
        assert_eq!(inserted, 2);
        let names: Vec<String> = dao.read_all::<User>().unwrap().into_iter().map(|u| u.name).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_init_schema_is_idempotent() {
        let dao = user_dao();
        dao.insert(&User::named("Ann", true)).unwrap();
        dao.init_table::<User>().unwrap();
        assert_eq!(dao.read_all::<User>().unwrap().len(), 1);
    }

    #[test]
    fn test_read_round_trips_every_field() {
        let dao = document_dao();
        let doc = document("d-1", "Draft");
        dao.insert(&doc).unwrap();
        let back: Document = dao.read_by_id("d-1").unwrap().unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_upsert_twice_keeps_one_row_with_latest_values() {
        let dao = document_dao();
        dao.upsert(&document("d-1", "First")).unwrap();
        let mut second = document("d-1", "Second");
        second.audit.revision = 2;
        dao.upsert(&second).unwrap();

        let all = dao.read_all::<Document>().unwrap();
        assert_eq!(all, vec![second]);
    }

    #[test]
    fn test_upsert_without_key_is_rejected() {
        let dao = user_dao();
        let err = dao.upsert(&User::named("Ann", true)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(dao.read_all::<User>().unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_key_is_reported() {
        let dao = document_dao();
        dao.insert(&document("d-1", "One")).unwrap();
        let err = dao.insert(&document("d-1", "Two")).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(_)));

        let err = dao.insert(&document("d-2", "One")).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(_)));
    }

    #[test]
    fn test_batch_stops_at_first_failure_and_keeps_prior_rows() {
        let dao = document_dao();
        let batch = [document("a", "A"), document("b", "B"), document("a", "C"), document("d", "D")];
        assert!(matches!(dao.insert_batch(&batch), Err(Error::DuplicateKey(_))));

        let ids: Vec<String> = dao
            .read_all::<Document>()
            .unwrap()
            .into_iter()
            .filter_map(|d| d.uid)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_update_by_id() {
        let dao = user_dao();
        let id = dao.insert(&User::named("Ann", false)).unwrap();

        assert_eq!(dao.update_by_id(id, &User::named("Anna", true)).unwrap(), 1);
        let anna: User = dao.read_by_id(id).unwrap().unwrap();
        assert_eq!(anna.name, "Anna");
        assert!(anna.active);

        assert_eq!(dao.update_by_id(999i64, &User::named("Ghost", true)).unwrap(), 0);
        assert!(matches!(
            dao.update_by_id(Value::Null, &User::named("x", true)),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_delete_variants_are_noops_when_nothing_matches() {
        let dao = document_dao();
        assert_eq!(dao.delete_by_id::<Document>("missing").unwrap(), 0);
        assert_eq!(dao.delete_all::<Document>().unwrap(), 0);

        let one = document("d-1", "One");
        dao.insert(&one).unwrap();
        dao.insert(&document("d-2", "Two")).unwrap();
        let mut third = document("d-3", "Three");
        third.audit.created_by = "bob".into();
        dao.insert(&third).unwrap();

        assert_eq!(dao.delete_by_instance(&one).unwrap(), 1);
        assert_eq!(dao.delete_by_instance(&one).unwrap(), 0);
        assert_eq!(dao.delete_by_column::<Document>("created_by", "bob").unwrap(), 1);
        assert_eq!(dao.delete_all::<Document>().unwrap(), 1);
        assert!(dao.read_all::<Document>().unwrap().is_empty());
    }

    #[test]
    fn test_query_by_columns() {
        let dao = document_dao();
        dao.insert(&document("d-1", "One")).unwrap();
        let mut other = document("d-2", "Two");
        other.audit.revision = 5;
        dao.insert(&other).unwrap();

        let hits: Vec<Document> = dao
            .query_by_columns(&["created_by", "revision"], &["ann".into(), Value::Integer(5)])
            .unwrap();
        assert_eq!(hits, vec![other]);

        let none: Vec<Document> = dao.query_by_columns(&["created_by"], &[Value::from("zed")]).unwrap();
        assert!(none.is_empty());

        assert!(matches!(
            dao.query_by_columns::<Document>(&[], &[]),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            dao.query_by_columns::<Document>(&["created_by"], &[]),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_query_raw_and_typed() {
        let dao = user_dao();
        dao.insert(&User::named("Ann", true)).unwrap();
        dao.insert(&User::named("Bob", false)).unwrap();

        let rows = dao.query_raw("SELECT name, active * 10 AS score FROM User ORDER BY id").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], Value::Text("Ann".into()));
        assert_eq!(rows[0]["score"], Value::Integer(10));

        let active: Vec<User> = dao.query_typed("SELECT * FROM User WHERE active = 1").unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Ann");

        let err = dao.query_typed::<User>("SELECT name FROM User").unwrap_err();
        assert!(matches!(err, Error::Materialization(_)));
    }

    #[test]
    fn test_backend_errors_surface() {
        let dao = user_dao();
        assert!(matches!(dao.query_raw("SELECT * FROM nowhere"), Err(Error::Backend(_))));
        // connection was released despite the failure
        assert_eq!(dao.read_all::<User>().unwrap().len(), 0);
    }

    #[test]
    fn test_upsert_unique_clash_keeps_other_row() {
        let dao = document_dao();
        dao.insert(&document("d-1", "Shared")).unwrap();

        let err = dao.upsert(&document("d-2", "Shared")).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(_)));

        let all = dao.read_all::<Document>().unwrap();
        assert_eq!(all, vec![document("d-1", "Shared")]);
    }

    #[test]
    fn test_upsert_updates_in_place() {
        let dao = document_dao();
        dao.insert(&document("d-1", "One")).unwrap();
        dao.insert(&document("d-2", "Two")).unwrap();

        let mut changed = document("d-1", "Uno");
        changed.score = 9.0;
        dao.upsert(&changed).unwrap();

        let ids: Vec<String> = dao
            .read_all::<Document>()
            .unwrap()
            .into_iter()
            .filter_map(|d| d.uid)
            .collect();
        assert_eq!(ids, vec!["d-1", "d-2"]);
        assert_eq!(dao.read_by_id::<Document>("d-1").unwrap(), Some(changed));
    }

    #[test]
    fn test_init_schema_checks_every_table_first() {
        let dao = SqliteDao::open_in_memory().unwrap();
        let twin_keys = TableMeta::from_shapes(
            "twin_keys",
            vec![Shape::new("TwinKeys")
                .field(FieldDescriptor::of::<i64>("a").primary_key())
                .field(FieldDescriptor::of::<i64>("b").primary_key())],
        )
        .unwrap();

        let err = dao
            .init_schema(&[TableMeta::of::<Document>().unwrap(), twin_keys])
            .unwrap_err();
        assert!(matches!(err, Error::Schema(_)));

        let tables = dao
            .query_raw("SELECT name FROM sqlite_master WHERE type = 'table'")
            .unwrap();
        assert!(tables.is_empty());
    }

    #[test]
    fn test_dao_call_reports_exhausted_pool() {
        let config = PoolConfig {
            connection_timeout_ms: 50,
            ..PoolConfig::default()
        };
        let dao = SqliteDao::new(ConnectionPool::open_in_memory_with(&config).unwrap());
        dao.init_table::<User>().unwrap();

        let held = dao.pool().acquire().unwrap();
        assert!(matches!(dao.read_all::<User>(), Err(Error::PoolExhausted(_))));
        assert!(matches!(dao.insert(&User::named("Ann", true)), Err(Error::PoolExhausted(_))));

        drop(held);
        assert!(dao.read_all::<User>().unwrap().is_empty());
    }
}
