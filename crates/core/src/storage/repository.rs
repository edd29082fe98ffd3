//! Generic repository operations
//!
//! CRUD, existence checks and single-level joins for any [`Entity`], built on
//! the statement builder. Each operation runs exactly one statement, so its
//! effect is visible only once that statement has completed.

use std::marker::PhantomData;

use rusqlite::types::{ToSql, Value};
use rusqlite::{Connection, Statement};
use tracing::debug;

use super::descriptor::EntityDescriptor;
use super::statement::{self, Direction, Logic};
use super::traits::{Entity, FromRow};
use crate::error::{Error, Result};

/// Filters, logic, ordering and limit of a query.
///
/// Each column may be compared once: values bind to a placeholder named
/// after the column, so a repeated column is rejected when the statement is
/// built.
#[derive(Debug, Clone, Default)]
pub struct Criteria {
    filters: Vec<(String, Value)>,
    logic: Logic,
    order: Vec<(String, Direction)>,
    limit: Option<u32>,
}

impl Criteria {
    /// No filters: matches every row
    pub fn all() -> Self {
        Self::default()
    }

    /// Rows matching any of the comparisons
    pub fn any() -> Self {
        Self {
            logic: Logic::Or,
            ..Self::default()
        }
    }

    /// Rows matching every comparison
    pub fn every() -> Self {
        Self {
            logic: Logic::And,
            ..Self::default()
        }
    }

    /// Match on the primary key of `entity`
    pub fn key_of<E: Entity>(entity: &E) -> Self {
        E::descriptor()
            .primary_key()
            .iter()
            .fold(Self::every(), |c, column| c.eq(column, entity.value(column)))
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push((column.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, column: &str, direction: Direction) -> Self {
        self.order.push((column.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    fn columns(&self) -> Vec<&str> {
        self.filters.iter().map(|(c, _)| c.as_str()).collect()
    }

    fn ordering(&self) -> Vec<(&str, Direction)> {
        self.order.iter().map(|(c, d)| (c.as_str(), *d)).collect()
    }

    fn params(&self) -> Vec<(String, Value)> {
        self.filters
            .iter()
            .map(|(c, v)| (format!(":{c}"), v.clone()))
            .collect()
    }
}

fn bind(params: &[(String, Value)]) -> Vec<(&str, &dyn ToSql)> {
    params
        .iter()
        .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
        .collect()
}

fn params_of<E: Entity>(entity: &E, columns: &[&str]) -> Vec<(String, Value)> {
    columns
        .iter()
        .map(|c| (format!(":{c}"), entity.value(c)))
        .collect()
}

fn execute(conn: &Connection, sql: &str, params: &[(String, Value)]) -> Result<usize> {
    debug!(sql, "Executing statement");
    conn.execute(sql, bind(params).as_slice())
        .map_err(Error::from_storage)
}

/// A prepared query whose rows are decoded lazily
pub struct Selection<'conn, T> {
    stmt: Statement<'conn>,
    params: Vec<(String, Value)>,
    _rows: PhantomData<T>,
}

impl<'conn, T: FromRow> Selection<'conn, T> {
    fn prepare(conn: &'conn Connection, sql: &str, params: Vec<(String, Value)>) -> Result<Self> {
        debug!(sql, "Preparing query");
        let stmt = conn.prepare(sql).map_err(Error::from_storage)?;
        Ok(Self {
            stmt,
            params,
            _rows: PhantomData,
        })
    }

    /// Run the query; rows are decoded as the iterator advances
    pub fn iter(&mut self) -> Result<impl Iterator<Item = Result<T>> + '_> {
        let params = bind(&self.params);
        let rows = self
            .stmt
            .query_map(params.as_slice(), |row| T::from_row(row, 0))
            .map_err(Error::from_storage)?;
        Ok(rows.map(|row| row.map_err(Error::from_storage)))
    }

    pub fn all(mut self) -> Result<Vec<T>> {
        let rows = self.iter()?.collect::<Result<Vec<_>>>();
        rows
    }

    pub fn first(mut self) -> Result<Option<T>> {
        let first = self.iter()?.next().transpose();
        first
    }
}

/// Select entities matching `criteria`.
///
/// Rows come back in store order unless the criteria request an ordering.
pub fn select<'c, E: Entity>(conn: &'c Connection, criteria: &Criteria) -> Result<Selection<'c, E>> {
    let sql = statement::select_ordered(
        E::descriptor(),
        &criteria.columns(),
        criteria.logic,
        &criteria.ordering(),
        criteria.limit,
    )?;
    Selection::prepare(conn, &sql, criteria.params())
}

/// First entity matching `criteria`
pub fn select_one<E: Entity>(conn: &Connection, criteria: &Criteria) -> Result<Option<E>> {
    select::<E>(conn, criteria)?.first()
}

pub fn exists<E: Entity>(conn: &Connection, criteria: &Criteria) -> Result<bool> {
    let sql = statement::exists(E::descriptor(), &criteria.columns(), criteria.logic)?;
    debug!(sql, "Checking existence");
    let params = criteria.params();
    conn.query_row(&sql, bind(&params).as_slice(), |row| row.get(0))
        .map_err(Error::from_storage)
}

/// Insert `entity`, writing only its non-null writable columns so the store
/// can fill in defaults.
///
/// A single-column primary key left null is generated by the store and
/// assigned back to the entity.
pub fn insert<E: Entity>(conn: &Connection, entity: &mut E) -> Result<()> {
    let desc = E::descriptor();
    let columns: Vec<&str> = desc
        .writable_column_names()
        .filter(|c| entity.value(c) != Value::Null)
        .collect();
    let sql = statement::insert(desc, &columns)?;
    execute(conn, &sql, &params_of(entity, &columns))?;

    if let [key] = desc.primary_key() {
        if !columns.contains(key) {
            entity.set_generated_key(conn.last_insert_rowid());
        }
    }
    Ok(())
}

/// Write every writable column of `entity`, matched by primary key.
///
/// Returns the number of rows changed; 0 means the entity was not found.
pub fn update<E: Entity>(conn: &Connection, entity: &E) -> Result<usize> {
    let desc = E::descriptor();
    let key = desc.primary_key();
    let mut columns: Vec<&str> = desc
        .writable_column_names()
        .filter(|c| !key.contains(c))
        .collect();
    let sql = statement::update(desc, None)?;
    columns.extend_from_slice(key);
    execute(conn, &sql, &params_of(entity, &columns))
}

/// Write only `set` columns of `entity`, matched by primary key
pub fn update_columns<E: Entity>(conn: &Connection, entity: &E, set: &[&str]) -> Result<usize> {
    let desc = E::descriptor();
    let sql = statement::update(desc, Some(set))?;
    let mut columns: Vec<&str> = set.to_vec();
    for column in desc.primary_key() {
        if !columns.contains(column) {
            columns.push(column);
        }
    }
    execute(conn, &sql, &params_of(entity, &columns))
}

/// Delete `entity` by primary key, returning the number of rows removed
pub fn delete<E: Entity>(conn: &Connection, entity: &E) -> Result<usize> {
    delete_where::<E>(conn, &Criteria::key_of(entity))
}

/// Delete every row matching `criteria`; empty criteria delete all rows
pub fn delete_where<E: Entity>(conn: &Connection, criteria: &Criteria) -> Result<usize> {
    let sql = statement::delete(E::descriptor(), &criteria.columns(), criteria.logic)?;
    execute(conn, &sql, &criteria.params())
}

/// Reload `entity` from the store by primary key
pub fn refresh<E: Entity>(conn: &Connection, entity: &mut E) -> Result<()> {
    match select_one::<E>(conn, &Criteria::key_of(entity))? {
        Some(fresh) => {
            *entity = fresh;
            Ok(())
        }
        None => Err(Error::NotFound(format!(
            "{} no longer exists",
            E::descriptor().name
        ))),
    }
}

fn check_foreign<E: Entity, F: Entity>(foreign_key: &str) -> Result<&'static EntityDescriptor> {
    let desc = E::descriptor();
    let target = desc.foreign(foreign_key)?;
    if !std::ptr::eq(target, F::descriptor()) {
        return Err(Error::NotForeignKey {
            entity: desc.name,
            column: foreign_key.to_string(),
            target: F::descriptor().name,
        });
    }
    Ok(desc)
}

/// Select (entity, foreign entity) pairs joined across `foreign_key`
pub fn join_select<'c, E: Entity, F: Entity>(
    conn: &'c Connection,
    foreign_key: &str,
    criteria: &Criteria,
) -> Result<Selection<'c, (E, F)>> {
    let desc = check_foreign::<E, F>(foreign_key)?;
    let sql = statement::join_select(
        desc,
        foreign_key,
        &criteria.columns(),
        criteria.logic,
        &criteria.ordering(),
    )?;
    Selection::prepare(conn, &sql, criteria.params())
}

/// `entity` paired with the row its `foreign_key` references
pub fn join_one<E: Entity, F: Entity>(
    conn: &Connection,
    entity: &E,
    foreign_key: &str,
) -> Result<Option<(E, F)>> {
    join_select::<E, F>(conn, foreign_key, &Criteria::key_of(entity))?.first()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Ballot, BallotGame, Game, GameState, Proposal};
    use crate::storage::Database;

    fn add_game(conn: &Connection, name: &str) -> Game {
        let mut game = Game::new(name, format!("https://example.com/{name}"));
        insert(conn, &mut game).unwrap();
        game
    }

    #[test]
    fn test_insert_assigns_generated_key() {
        let db = Database::open_in_memory().unwrap();
        let first = add_game(db.conn(), "Outer Wilds");
        let second = add_game(db.conn(), "Celeste");
        assert!(first.game_id.is_some());
        assert_ne!(first.game_id, second.game_id);
    }

    #[test]
    fn test_insert_then_select_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let game = add_game(db.conn(), "Hades");

        let loaded: Game = select_one(db.conn(), &Criteria::key_of(&game))
            .unwrap()
            .unwrap();
        assert_eq!(loaded, game);
    }

    #[test]
    fn test_composite_key_is_not_overwritten() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.conn();
        let game = add_game(conn, "Tunic");
        let mut ballot = Ballot::new(99, chrono::Utc::now(), chrono::Duration::days(1)).unwrap();
        insert(conn, &mut ballot).unwrap();
        refresh(conn, &mut ballot).unwrap();

        let mut link = BallotGame::new(ballot.id(), game.id());
        insert(conn, &mut link).unwrap();
        assert_eq!(link, BallotGame::new(ballot.id(), game.id()));

        let loaded: BallotGame = select_one(conn, &Criteria::key_of(&link)).unwrap().unwrap();
        assert_eq!(loaded, link);
    }

    #[test]
    fn test_insert_uses_store_defaults() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.conn();
        let game = add_game(conn, "Inscryption");

        let mut proposal = Proposal::new(1001, game.id());
        insert(conn, &mut proposal).unwrap();
        assert_eq!(proposal.discord_user_id, 1001);
        assert!(proposal.date_created.is_none());

        refresh(conn, &mut proposal).unwrap();
        assert!(proposal.date_created.is_some());
    }

    #[test]
    fn test_select_with_logic_and_order() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.conn();
        let a = add_game(conn, "A");
        let b = add_game(conn, "B");
        add_game(conn, "C");

        let either: Vec<Game> = select(
            conn,
            &Criteria::any()
                .eq("name", "A".to_string())
                .eq("url", b.url.clone())
                .order_by("game_id", Direction::Desc),
        )
        .unwrap()
        .all()
        .unwrap();
        assert_eq!(either, vec![b.clone(), a.clone()]);

        let both: Vec<Game> = select(
            conn,
            &Criteria::every()
                .eq("name", "A".to_string())
                .eq("url", b.url.clone()),
        )
        .unwrap()
        .all()
        .unwrap();
        assert!(both.is_empty());

        let all: Vec<Game> = select(conn, &Criteria::all().order_by("game_id", Direction::Asc))
            .unwrap()
            .all()
            .unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0], a);
    }

    #[test]
    fn test_repeated_column_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.conn();
        add_game(conn, "A");
        add_game(conn, "B");

        let criteria = Criteria::any()
            .eq("name", "A".to_string())
            .eq("name", "B".to_string());
        assert!(matches!(
            select::<Game>(conn, &criteria),
            Err(Error::RepeatedFilter { column, .. }) if column == "name"
        ));
        assert!(matches!(
            exists::<Game>(conn, &criteria),
            Err(Error::RepeatedFilter { .. })
        ));
        assert!(matches!(
            delete_where::<Game>(conn, &criteria),
            Err(Error::RepeatedFilter { .. })
        ));
        assert_eq!(select::<Game>(conn, &Criteria::all()).unwrap().all().unwrap().len(), 2);
    }

    #[test]
    fn test_selection_is_lazy() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.conn();
        for name in ["A", "B", "C"] {
            add_game(conn, name);
        }

        let mut selection = select::<Game>(conn, &Criteria::all()).unwrap();
        let mut rows = selection.iter().unwrap();
        assert!(rows.next().unwrap().is_ok());
        assert!(rows.next().unwrap().is_ok());
    }

    #[test]
    fn test_exists() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.conn();
        add_game(conn, "Noita");

        assert!(exists::<Game>(conn, &Criteria::any().eq("name", "Noita".to_string())).unwrap());
        assert!(!exists::<Game>(conn, &Criteria::any().eq("name", "Spelunky".to_string())).unwrap());
        assert!(exists::<Game>(conn, &Criteria::all()).unwrap());
    }

    #[test]
    fn test_update_and_delete_report_row_counts() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.conn();
        let mut game = add_game(conn, "Baba Is You");

        game.state = GameState::Accepted;
        assert_eq!(update(conn, &game).unwrap(), 1);
        // Re-applying the same state still matches the row
        assert_eq!(update(conn, &game).unwrap(), 1);

        let loaded: Game = select_one(conn, &Criteria::key_of(&game)).unwrap().unwrap();
        assert_eq!(loaded.state, GameState::Accepted);

        assert_eq!(delete(conn, &game).unwrap(), 1);
        assert_eq!(delete(conn, &game).unwrap(), 0);
        assert_eq!(update(conn, &game).unwrap(), 0);
        assert!(refresh(conn, &mut game).unwrap_err().is_not_found());
    }

    #[test]
    fn test_update_columns_writes_subset() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.conn();
        let mut game = add_game(conn, "Katana Zero");

        game.state = GameState::Done;
        game.name = "renamed".to_string();
        assert_eq!(update_columns(conn, &game, &["state"]).unwrap(), 1);

        let loaded: Game = select_one(conn, &Criteria::key_of(&game)).unwrap().unwrap();
        assert_eq!(loaded.state, GameState::Done);
        assert_eq!(loaded.name, "Katana Zero");
    }

    #[test]
    fn test_delete_where_without_filters_deletes_all() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.conn();
        add_game(conn, "A");
        add_game(conn, "B");
        assert_eq!(delete_where::<Game>(conn, &Criteria::all()).unwrap(), 2);
    }

    #[test]
    fn test_join_select_pairs_rows() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.conn();
        let game = add_game(conn, "Dredge");
        let mut proposal = Proposal::new(7, game.id());
        insert(conn, &mut proposal).unwrap();

        let pairs: Vec<(Proposal, Game)> =
            join_select(conn, "game_id", &Criteria::any().eq("discord_user_id", 7i64))
                .unwrap()
                .all()
                .unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0.discord_user_id, 7);
        assert_eq!(pairs[0].1, game);

        let (_, joined) = join_one::<Proposal, Game>(conn, &proposal, "game_id")
            .unwrap()
            .unwrap();
        assert_eq!(joined, game);
    }

    #[test]
    fn test_join_select_checks_foreign_type() {
        let db = Database::open_in_memory().unwrap();
        let result = join_select::<Proposal, Ballot>(db.conn(), "game_id", &Criteria::all());
        assert!(matches!(result, Err(Error::NotForeignKey { .. })));
    }

    #[test]
    fn test_duplicate_insert_is_duplication() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.conn();
        add_game(conn, "Celeste");
        let mut again = Game::new("Celeste", "https://example.com/Celeste");
        assert!(insert(conn, &mut again).unwrap_err().is_duplication());
        assert!(again.game_id.is_none());
    }
}
