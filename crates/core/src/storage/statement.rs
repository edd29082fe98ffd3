//! SQL generation from entity descriptors
//!
//! Every builder validates the column names it is given against the
//! descriptor, so only declared identifiers ever reach the SQL text. Values
//! are never interpolated: each compared or written column is bound through a
//! named placeholder of the same name (`column = :column`).

use super::descriptor::EntityDescriptor;
use crate::error::{Error, Result};

/// How filter comparisons are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Logic {
    And,
    #[default]
    Or,
}

impl Logic {
    fn as_sql(&self) -> &'static str {
        match self {
            Logic::And => " AND ",
            Logic::Or => " OR ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Filter columns must be declared and appear at most once
fn check_columns(desc: &EntityDescriptor, columns: &[&str]) -> Result<()> {
    for (i, column) in columns.iter().enumerate() {
        desc.column(column)?;
        if columns[..i].contains(column) {
            return Err(Error::RepeatedFilter {
                entity: desc.name,
                column: column.to_string(),
            });
        }
    }
    Ok(())
}

fn check_writable(desc: &EntityDescriptor, columns: &[&str]) -> Result<()> {
    for column in columns {
        if !desc.is_writable(column) {
            return Err(Error::UnknownColumn {
                entity: desc.name,
                column: format!("{column} (not writable)"),
            });
        }
    }
    Ok(())
}

fn qualified(qualifier: Option<&str>, column: &str) -> String {
    match qualifier {
        Some(q) => format!("{q}.{column}"),
        None => column.to_string(),
    }
}

/// `WHERE a = :a OR b = :b`, or nothing for an empty filter set
pub fn where_clause(qualifier: Option<&str>, filters: &[&str], logic: Logic) -> String {
    if filters.is_empty() {
        return String::new();
    }
    let comparisons: Vec<String> = filters
        .iter()
        .map(|column| format!("{} = :{column}", qualified(qualifier, column)))
        .collect();
    format!(" WHERE {}", comparisons.join(logic.as_sql()))
}

fn order_clause(
    desc: &EntityDescriptor,
    qualifier: Option<&str>,
    order: &[(&str, Direction)],
) -> Result<String> {
    if order.is_empty() {
        return Ok(String::new());
    }
    let mut terms = Vec::with_capacity(order.len());
    for (column, direction) in order {
        desc.column(column)?;
        terms.push(format!(
            "{} {}",
            qualified(qualifier, column),
            direction.as_sql()
        ));
    }
    Ok(format!(" ORDER BY {}", terms.join(", ")))
}

fn limit_clause(limit: Option<u32>) -> String {
    limit.map(|n| format!(" LIMIT {n}")).unwrap_or_default()
}

/// Select every column of the entity from its read relation
pub fn select(desc: &EntityDescriptor, filters: &[&str], logic: Logic) -> Result<String> {
    select_ordered(desc, filters, logic, &[], None)
}

/// [`select`] with an explicit ORDER BY and LIMIT
pub fn select_ordered(
    desc: &EntityDescriptor,
    filters: &[&str],
    logic: Logic,
    order: &[(&str, Direction)],
    limit: Option<u32>,
) -> Result<String> {
    check_columns(desc, filters)?;
    let columns: Vec<_> = desc.column_names().collect();
    Ok(format!(
        "SELECT {} FROM {}{}{}{}",
        columns.join(", "),
        desc.source(),
        where_clause(None, filters, logic),
        order_clause(desc, None, order)?,
        limit_clause(limit),
    ))
}

/// `SELECT EXISTS (...)` over a filtered select
pub fn exists(desc: &EntityDescriptor, filters: &[&str], logic: Logic) -> Result<String> {
    check_columns(desc, filters)?;
    Ok(format!(
        "SELECT EXISTS (SELECT 1 FROM {}{})",
        desc.source(),
        where_clause(None, filters, logic),
    ))
}

/// Insert the given writable columns; an empty list inserts all defaults
pub fn insert(desc: &EntityDescriptor, columns: &[&str]) -> Result<String> {
    check_writable(desc, columns)?;
    if columns.is_empty() {
        return Ok(format!("INSERT INTO {} DEFAULT VALUES", desc.table));
    }
    let placeholders: Vec<String> = columns.iter().map(|c| format!(":{c}")).collect();
    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        desc.table,
        columns.join(", "),
        placeholders.join(", "),
    ))
}

/// Update by primary key.
///
/// Without an explicit `set`, every writable column outside the primary key
/// is written.
pub fn update(desc: &EntityDescriptor, set: Option<&[&str]>) -> Result<String> {
    let key = desc.primary_key();
    let columns: Vec<&str> = match set {
        Some(set) => {
            check_writable(desc, set)?;
            set.to_vec()
        }
        None => desc
            .writable_column_names()
            .filter(|c| !key.contains(c))
            .collect(),
    };
    if columns.is_empty() {
        return Err(Error::Integrity(format!(
            "{} has no columns to update",
            desc.name
        )));
    }
    let assignments: Vec<String> = columns.iter().map(|c| format!("{c} = :{c}")).collect();
    Ok(format!(
        "UPDATE {} SET {}{}",
        desc.table,
        assignments.join(", "),
        where_clause(None, key, Logic::And),
    ))
}

/// Delete matching rows; an empty filter set deletes every row
pub fn delete(desc: &EntityDescriptor, filters: &[&str], logic: Logic) -> Result<String> {
    check_columns(desc, filters)?;
    Ok(format!(
        "DELETE FROM {}{}",
        desc.table,
        where_clause(None, filters, logic),
    ))
}

/// Inner join between the entity and the entity its `foreign_key` references.
///
/// Selects the entity's columns followed by the foreign entity's columns.
/// Filters and ordering apply to the entity's own columns.
pub fn join_select(
    desc: &EntityDescriptor,
    foreign_key: &str,
    filters: &[&str],
    logic: Logic,
    order: &[(&str, Direction)],
) -> Result<String> {
    let foreign = desc.foreign(foreign_key)?;
    check_columns(desc, filters)?;

    let own = desc.source();
    let other = foreign.source();
    let columns: Vec<String> = desc
        .column_names()
        .map(|c| format!("{own}.{c}"))
        .chain(foreign.column_names().map(|c| format!("{other}.{c}")))
        .collect();

    Ok(format!(
        "SELECT {} FROM {own} INNER JOIN {other} ON {other}.{foreign_key} = {own}.{foreign_key}{}{}",
        columns.join(", "),
        where_clause(Some(own), filters, logic),
        order_clause(desc, Some(own), order)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::descriptor::Column;

    static GAMES: EntityDescriptor = EntityDescriptor {
        name: "Game",
        table: "games",
        view: None,
        columns: &[
            Column::new("game_id"),
            Column::new("name"),
            Column::new("state"),
        ],
        primary_key: None,
    };

    static POLLS: EntityDescriptor = EntityDescriptor {
        name: "Poll",
        table: "polls",
        view: Some("polls_view"),
        columns: &[Column::new("poll_id"), Column::computed("state")],
        primary_key: None,
    };

    static LINKS: EntityDescriptor = EntityDescriptor {
        name: "Link",
        table: "links",
        view: None,
        columns: &[
            Column::new("votes"),
            Column::foreign("poll_id", &POLLS),
            Column::foreign("game_id", &GAMES),
        ],
        primary_key: Some(&["poll_id", "game_id"]),
    };

    #[test]
    fn test_select_without_filters_has_no_where() {
        assert_eq!(
            select(&GAMES, &[], Logic::Or).unwrap(),
            "SELECT game_id, name, state FROM games"
        );
    }

    #[test]
    fn test_select_combines_with_logic() {
        assert_eq!(
            select(&GAMES, &["name", "state"], Logic::Or).unwrap(),
            "SELECT game_id, name, state FROM games WHERE name = :name OR state = :state"
        );
        assert_eq!(
            select(&GAMES, &["name", "state"], Logic::And).unwrap(),
            "SELECT game_id, name, state FROM games WHERE name = :name AND state = :state"
        );
    }

    #[test]
    fn test_repeated_filter_column_is_rejected() {
        assert!(matches!(
            select(&GAMES, &["name", "state", "name"], Logic::Or),
            Err(Error::RepeatedFilter { column, .. }) if column == "name"
        ));
        assert!(matches!(
            delete(&GAMES, &["state", "state"], Logic::And),
            Err(Error::RepeatedFilter { .. })
        ));
    }

    #[test]
    fn test_select_reads_view() {
        assert_eq!(
            select(&POLLS, &["state"], Logic::Or).unwrap(),
            "SELECT poll_id, state FROM polls_view WHERE state = :state"
        );
    }

    #[test]
    fn test_select_ordered_with_limit() {
        assert_eq!(
            select_ordered(&GAMES, &[], Logic::Or, &[("game_id", Direction::Desc)], Some(10))
                .unwrap(),
            "SELECT game_id, name, state FROM games ORDER BY game_id DESC LIMIT 10"
        );
    }

    #[test]
    fn test_unknown_columns_are_rejected() {
        let err = select(&GAMES, &["name; DROP TABLE games"], Logic::Or).unwrap_err();
        assert!(matches!(err, Error::UnknownColumn { .. }));
        assert!(select_ordered(&GAMES, &[], Logic::Or, &[("1", Direction::Asc)], None).is_err());
    }

    #[test]
    fn test_exists() {
        assert_eq!(
            exists(&GAMES, &["name"], Logic::Or).unwrap(),
            "SELECT EXISTS (SELECT 1 FROM games WHERE name = :name)"
        );
    }

    #[test]
    fn test_insert_only_given_columns() {
        assert_eq!(
            insert(&GAMES, &["name", "state"]).unwrap(),
            "INSERT INTO games (name, state) VALUES (:name, :state)"
        );
        assert_eq!(
            insert(&GAMES, &[]).unwrap(),
            "INSERT INTO games DEFAULT VALUES"
        );
    }

    #[test]
    fn test_insert_refuses_virtual_columns() {
        assert!(insert(&POLLS, &["poll_id", "state"]).is_err());
    }

    #[test]
    fn test_update_by_primary_key() {
        assert_eq!(
            update(&GAMES, None).unwrap(),
            "UPDATE games SET name = :name, state = :state WHERE game_id = :game_id"
        );
        assert_eq!(
            update(&LINKS, None).unwrap(),
            "UPDATE links SET votes = :votes WHERE poll_id = :poll_id AND game_id = :game_id"
        );
        assert_eq!(
            update(&GAMES, Some(&["state"])).unwrap(),
            "UPDATE games SET state = :state WHERE game_id = :game_id"
        );
    }

    #[test]
    fn test_update_skips_virtual_columns() {
        // polls has nothing writable besides its key
        assert!(matches!(update(&POLLS, None), Err(Error::Integrity(_))));
    }

    #[test]
    fn test_delete() {
        assert_eq!(
            delete(&LINKS, &["poll_id", "game_id"], Logic::And).unwrap(),
            "DELETE FROM links WHERE poll_id = :poll_id AND game_id = :game_id"
        );
        assert_eq!(delete(&LINKS, &[], Logic::And).unwrap(), "DELETE FROM links");
    }

    #[test]
    fn test_join_select() {
        assert_eq!(
            join_select(&LINKS, "game_id", &["poll_id"], Logic::Or, &[]).unwrap(),
            "SELECT links.votes, links.poll_id, links.game_id, games.game_id, games.name, games.state \
             FROM links INNER JOIN games ON games.game_id = links.game_id \
             WHERE links.poll_id = :poll_id"
        );
    }

    #[test]
    fn test_join_select_ordered() {
        let sql = join_select(
            &LINKS,
            "poll_id",
            &[],
            Logic::Or,
            &[("votes", Direction::Desc), ("game_id", Direction::Asc)],
        )
        .unwrap();
        assert!(sql.contains("INNER JOIN polls_view ON polls_view.poll_id = links.poll_id"));
        assert!(sql.ends_with("ORDER BY links.votes DESC, links.game_id ASC"));
    }

    #[test]
    fn test_join_requires_foreign_key() {
        assert!(matches!(
            join_select(&LINKS, "votes", &[], Logic::Or, &[]),
            Err(Error::NotForeignKey { .. })
        ));
    }
}
