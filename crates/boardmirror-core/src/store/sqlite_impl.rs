use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Transaction};

use crate::error::CoreError;
use crate::identifiers::{BoardExternalId, CardExternalId, ListExternalId, MemberExternalId};
use crate::store::{
    BoardRecord, CardListTransition, CardMovementRecord, CardRecord, EntityStore, ListRecord,
    NewCardEvent, TransitionOutcome, UpsertBoard, UpsertCard, UpsertList,
};

const CURRENT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug)]
pub struct SqliteEntityStore {
    conn: Connection,
}

impl SqliteEntityStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let conn = Connection::open(path).map_err(|err| CoreError::Persistence(err.to_string()))?;
        let mut store = Self { conn };
        store.bootstrap()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self, CoreError> {
        let conn =
            Connection::open_in_memory().map_err(|err| CoreError::Persistence(err.to_string()))?;
        let mut store = Self { conn };
        store.bootstrap()?;
        Ok(store)
    }

    pub fn schema_version(&self) -> Result<u32, CoreError> {
        self.current_schema_version()
    }

    fn bootstrap(&mut self) -> Result<(), CoreError> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|err| CoreError::Persistence(err.to_string()))?;

        let current = self.current_schema_version()?;
        if current > CURRENT_SCHEMA_VERSION {
            return Err(CoreError::UnsupportedSchemaVersion {
                supported: CURRENT_SCHEMA_VERSION,
                found: current,
            });
        }

        self.apply_pending_migrations(current)
    }

    fn table_exists(&self, name: &str) -> Result<bool, CoreError> {
        self.conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1 LIMIT 1",
                params![name],
                |_| Ok(()),
            )
            .optional()
            .map(|opt| opt.is_some())
            .map_err(|err| CoreError::Persistence(err.to_string()))
    }

    fn current_schema_version(&self) -> Result<u32, CoreError> {
        if !self.table_exists("schema_migrations")? {
            return Ok(0);
        }

        self.conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
                [],
                |row| row.get(0),
            )
            .map_err(|err| CoreError::Persistence(err.to_string()))
    }

    fn apply_pending_migrations(&mut self, current: u32) -> Result<(), CoreError> {
        for version in (current + 1)..=CURRENT_SCHEMA_VERSION {
            let tx = self
                .conn
                .transaction()
                .map_err(|err| CoreError::Persistence(err.to_string()))?;
            Self::apply_migration(&tx, version)?;
            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))",
                params![version],
            )
            .map_err(|err| CoreError::Persistence(err.to_string()))?;
            tx.commit()
                .map_err(|err| CoreError::Persistence(err.to_string()))?;
        }

        Ok(())
    }

    fn apply_migration(tx: &Transaction<'_>, version: u32) -> Result<(), CoreError> {
        match version {
            1 => tx
                .execute_batch(
                    "
                    CREATE TABLE schema_migrations (
                        version INTEGER PRIMARY KEY,
                        applied_at TEXT NOT NULL
                    );

                    CREATE TABLE boards (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        external_id TEXT NOT NULL UNIQUE,
                        name TEXT,
                        url TEXT
                    );

                    CREATE TABLE lists (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        external_id TEXT NOT NULL UNIQUE,
                        board_id INTEGER,
                        name TEXT,
                        position REAL,
                        closed INTEGER NOT NULL DEFAULT 0,
                        FOREIGN KEY(board_id) REFERENCES boards(id)
                    );

                    CREATE TABLE cards (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        external_id TEXT NOT NULL UNIQUE,
                        current_list_id INTEGER,
                        closed INTEGER NOT NULL DEFAULT 0,
                        creator_member_external_id TEXT,
                        created_at TEXT,
                        updated_at TEXT,
                        FOREIGN KEY(current_list_id) REFERENCES lists(id)
                    );

                    CREATE TABLE card_movements (
                        seq INTEGER PRIMARY KEY AUTOINCREMENT,
                        card_id INTEGER NOT NULL,
                        list_id INTEGER NOT NULL,
                        member_external_id TEXT,
                        occurred_at TEXT,
                        idempotency_key TEXT NOT NULL UNIQUE,
                        FOREIGN KEY(card_id) REFERENCES cards(id),
                        FOREIGN KEY(list_id) REFERENCES lists(id)
                    );

                    CREATE TABLE card_events (
                        seq INTEGER PRIMARY KEY AUTOINCREMENT,
                        card_id INTEGER NOT NULL,
                        action_type TEXT NOT NULL,
                        member_external_id TEXT,
                        occurred_at TEXT,
                        FOREIGN KEY(card_id) REFERENCES cards(id)
                    );

                    CREATE INDEX idx_lists_board_lookup ON lists(board_id);
                    CREATE INDEX idx_cards_current_list_lookup ON cards(current_list_id);
                    CREATE INDEX idx_movements_card_order ON card_movements(card_id, seq ASC);
                    CREATE INDEX idx_card_events_card_order ON card_events(card_id, seq ASC);
                    ",
                )
                .map_err(|err| CoreError::Persistence(err.to_string())),
            _ => Err(CoreError::Persistence(format!(
                "no migration implementation for version {version}"
            ))),
        }
    }

    /// Board and list rows are created on first reference; callers that only
    /// know an external id get a bare row the merge semantics fill in later.
    fn ensure_board_row(conn: &Connection, external_id: &BoardExternalId) -> Result<(), CoreError> {
        conn.execute(
            "INSERT INTO boards (external_id) VALUES (?1) ON CONFLICT(external_id) DO NOTHING",
            params![external_id.as_str()],
        )
        .map_err(|err| CoreError::Persistence(err.to_string()))?;
        Ok(())
    }

    fn ensure_list_row(conn: &Connection, external_id: &ListExternalId) -> Result<(), CoreError> {
        conn.execute(
            "INSERT INTO lists (external_id) VALUES (?1) ON CONFLICT(external_id) DO NOTHING",
            params![external_id.as_str()],
        )
        .map_err(|err| CoreError::Persistence(err.to_string()))?;
        Ok(())
    }

    fn find_card_row_id(
        conn: &Connection,
        external_id: &CardExternalId,
    ) -> Result<Option<i64>, CoreError> {
        conn.query_row(
            "SELECT id FROM cards WHERE external_id = ?1",
            params![external_id.as_str()],
            |row| row.get(0),
        )
        .optional()
        .map_err(|err| CoreError::Persistence(err.to_string()))
    }

    fn map_card_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CardRecord> {
        Ok(CardRecord {
            external_id: row.get::<_, String>(0)?.into(),
            current_list_external_id: row
                .get::<_, Option<String>>(1)?
                .map(ListExternalId::from),
            closed: row.get::<_, i64>(2)? != 0,
            creator_member_external_id: row
                .get::<_, Option<String>>(3)?
                .map(MemberExternalId::from),
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

const SELECT_CARD_COLUMNS: &str = "
    SELECT c.external_id, l.external_id, c.closed, c.creator_member_external_id, c.created_at, c.updated_at
    FROM cards c
    LEFT JOIN lists l ON l.id = c.current_list_id
";

impl EntityStore for SqliteEntityStore {
    fn upsert_board(&mut self, board: &UpsertBoard) -> Result<(), CoreError> {
        self.conn
            .execute(
                "
                INSERT INTO boards (external_id, name, url)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(external_id) DO UPDATE SET
                    name = COALESCE(boards.name, excluded.name),
                    url = COALESCE(boards.url, excluded.url)
                ",
                params![board.external_id.as_str(), board.name, board.url],
            )
            .map_err(|err| CoreError::Persistence(err.to_string()))?;
        Ok(())
    }

    fn upsert_list(&mut self, list: &UpsertList) -> Result<(), CoreError> {
        if let Some(board_external_id) = &list.board_external_id {
            Self::ensure_board_row(&self.conn, board_external_id)?;
        }

        let board_external_id = list.board_external_id.as_ref().map(|id| id.as_str());
        let closed = list.closed.map(i64::from);
        self.conn
            .execute(
                "
                INSERT INTO lists (external_id, board_id, name, position, closed)
                VALUES (
                    ?1,
                    (SELECT id FROM boards WHERE external_id = ?2),
                    ?3,
                    ?4,
                    COALESCE(?5, 0)
                )
                ON CONFLICT(external_id) DO UPDATE SET
                    board_id = COALESCE(lists.board_id, (SELECT id FROM boards WHERE external_id = ?2)),
                    name = COALESCE(lists.name, excluded.name),
                    position = COALESCE(lists.position, excluded.position),
                    closed = COALESCE(?5, lists.closed)
                ",
                params![
                    list.external_id.as_str(),
                    board_external_id,
                    list.name,
                    list.position,
                    closed,
                ],
            )
            .map_err(|err| CoreError::Persistence(err.to_string()))?;
        Ok(())
    }

    fn upsert_card(&mut self, card: &UpsertCard) -> Result<(), CoreError> {
        if let Some(list_external_id) = &card.current_list_external_id {
            Self::ensure_list_row(&self.conn, list_external_id)?;
        }

        let list_external_id = card.current_list_external_id.as_ref().map(|id| id.as_str());
        let closed = card.closed.map(i64::from);
        self.conn
            .execute(
                "
                INSERT INTO cards (external_id, current_list_id, closed, created_at, updated_at)
                VALUES (
                    ?1,
                    (SELECT id FROM lists WHERE external_id = ?2),
                    COALESCE(?3, 0),
                    ?4,
                    strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                )
                ON CONFLICT(external_id) DO UPDATE SET
                    current_list_id = COALESCE(cards.current_list_id, (SELECT id FROM lists WHERE external_id = ?2)),
                    closed = COALESCE(?3, cards.closed),
                    created_at = COALESCE(cards.created_at, excluded.created_at),
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                ",
                params![
                    card.external_id.as_str(),
                    list_external_id,
                    closed,
                    card.created_at,
                ],
            )
            .map_err(|err| CoreError::Persistence(err.to_string()))?;
        Ok(())
    }

    fn record_card_event(&mut self, event: &NewCardEvent) -> Result<(), CoreError> {
        let card_id = Self::find_card_row_id(&self.conn, &event.card_external_id)?.ok_or_else(
            || {
                CoreError::Conflict(format!(
                    "card '{}' is not mirrored locally; refusing to record an event for it",
                    event.card_external_id.as_str()
                ))
            },
        )?;

        self.conn
            .execute(
                "
                INSERT INTO card_events (card_id, action_type, member_external_id, occurred_at)
                VALUES (?1, ?2, ?3, ?4)
                ",
                params![
                    card_id,
                    event.action_type,
                    event.member_external_id.as_ref().map(|id| id.as_str()),
                    event.occurred_at,
                ],
            )
            .map_err(|err| CoreError::Persistence(err.to_string()))?;
        Ok(())
    }

    fn set_card_current_list(
        &mut self,
        transition: &CardListTransition,
    ) -> Result<TransitionOutcome, CoreError> {
        let tx = self
            .conn
            .transaction()
            .map_err(|err| CoreError::Persistence(err.to_string()))?;

        let already_applied: Option<i64> = tx
            .query_row(
                "SELECT seq FROM card_movements WHERE idempotency_key = ?1",
                params![transition.idempotency_key.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| CoreError::Persistence(err.to_string()))?;
        if already_applied.is_some() {
            return Ok(TransitionOutcome::AlreadyApplied);
        }

        let card_id: i64 = tx
            .query_row(
                "SELECT id FROM cards WHERE external_id = ?1",
                params![transition.card_external_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| CoreError::Persistence(err.to_string()))?
            .ok_or_else(|| {
                CoreError::Conflict(format!(
                    "card '{}' is not mirrored locally; refusing to record a movement for it",
                    transition.card_external_id.as_str()
                ))
            })?;
        let list_id: i64 = tx
            .query_row(
                "SELECT id FROM lists WHERE external_id = ?1",
                params![transition.list_external_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| CoreError::Persistence(err.to_string()))?
            .ok_or_else(|| {
                CoreError::Conflict(format!(
                    "list '{}' is not mirrored locally; upsert it before recording a movement",
                    transition.list_external_id.as_str()
                ))
            })?;

        tx.execute(
            "
            INSERT INTO card_movements (card_id, list_id, member_external_id, occurred_at, idempotency_key)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![
                card_id,
                list_id,
                transition.member_external_id.as_ref().map(|id| id.as_str()),
                transition.occurred_at,
                transition.idempotency_key.as_str(),
            ],
        )
        .map_err(|err| CoreError::Persistence(err.to_string()))?;
        tx.execute(
            "
            UPDATE cards
            SET current_list_id = ?2,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            WHERE id = ?1
            ",
            params![card_id, list_id],
        )
        .map_err(|err| CoreError::Persistence(err.to_string()))?;

        tx.commit()
            .map_err(|err| CoreError::Persistence(err.to_string()))?;
        Ok(TransitionOutcome::Applied)
    }

    fn cards_missing_current_list(&self, limit: usize) -> Result<Vec<CardRecord>, CoreError> {
        let limit = i64::try_from(limit)
            .map_err(|_| CoreError::Persistence(format!("batch limit '{limit}' exceeds i64")))?;
        let mut stmt = self
            .conn
            .prepare(&format!(
                "{SELECT_CARD_COLUMNS}
                WHERE c.current_list_id IS NULL AND c.closed = 0
                ORDER BY c.id ASC
                LIMIT ?1
                "
            ))
            .map_err(|err| CoreError::Persistence(err.to_string()))?;

        let rows = stmt
            .query_map(params![limit], Self::map_card_row)
            .map_err(|err| CoreError::Persistence(err.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|err| CoreError::Persistence(err.to_string()))
    }

    fn cards_missing_creator(&self) -> Result<Vec<CardRecord>, CoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "{SELECT_CARD_COLUMNS}
                WHERE c.creator_member_external_id IS NULL
                ORDER BY c.id ASC
                "
            ))
            .map_err(|err| CoreError::Persistence(err.to_string()))?;

        let rows = stmt
            .query_map([], Self::map_card_row)
            .map_err(|err| CoreError::Persistence(err.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|err| CoreError::Persistence(err.to_string()))
    }

    fn assign_missing_creators_from_movements(&mut self) -> Result<u64, CoreError> {
        let updated = self
            .conn
            .execute(
                "
                UPDATE cards
                SET creator_member_external_id = (
                    SELECT m.member_external_id
                    FROM card_movements m
                    WHERE m.card_id = cards.id
                    ORDER BY (m.occurred_at IS NULL) ASC, m.occurred_at ASC, m.seq ASC
                    LIMIT 1
                )
                WHERE creator_member_external_id IS NULL
                  AND (
                    SELECT m.member_external_id
                    FROM card_movements m
                    WHERE m.card_id = cards.id
                    ORDER BY (m.occurred_at IS NULL) ASC, m.occurred_at ASC, m.seq ASC
                    LIMIT 1
                  ) IS NOT NULL
                ",
                [],
            )
            .map_err(|err| CoreError::Persistence(err.to_string()))?;

        u64::try_from(updated)
            .map_err(|_| CoreError::Persistence("updated row count exceeds u64".to_owned()))
    }

    fn assign_missing_creators_from_creation_events(&mut self) -> Result<u64, CoreError> {
        let updated = self
            .conn
            .execute(
                "
                UPDATE cards
                SET creator_member_external_id = (
                    SELECT e.member_external_id
                    FROM card_events e
                    WHERE e.card_id = cards.id
                      AND e.action_type = 'created'
                      AND e.member_external_id IS NOT NULL
                    ORDER BY (e.occurred_at IS NULL) ASC, e.occurred_at ASC, e.seq ASC
                    LIMIT 1
                )
                WHERE creator_member_external_id IS NULL
                  AND EXISTS (
                    SELECT 1
                    FROM card_events e
                    WHERE e.card_id = cards.id
                      AND e.action_type = 'created'
                      AND e.member_external_id IS NOT NULL
                  )
                ",
                [],
            )
            .map_err(|err| CoreError::Persistence(err.to_string()))?;

        u64::try_from(updated)
            .map_err(|_| CoreError::Persistence("updated row count exceeds u64".to_owned()))
    }

    fn find_board(&self, external_id: &BoardExternalId) -> Result<Option<BoardRecord>, CoreError> {
        self.conn
            .query_row(
                "SELECT external_id, name, url FROM boards WHERE external_id = ?1",
                params![external_id.as_str()],
                |row| {
                    Ok(BoardRecord {
                        external_id: row.get::<_, String>(0)?.into(),
                        name: row.get(1)?,
                        url: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(|err| CoreError::Persistence(err.to_string()))
    }

    fn find_list(&self, external_id: &ListExternalId) -> Result<Option<ListRecord>, CoreError> {
        self.conn
            .query_row(
                "
                SELECT l.external_id, b.external_id, l.name, l.position, l.closed
                FROM lists l
                LEFT JOIN boards b ON b.id = l.board_id
                WHERE l.external_id = ?1
                ",
                params![external_id.as_str()],
                |row| {
                    Ok(ListRecord {
                        external_id: row.get::<_, String>(0)?.into(),
                        board_external_id: row
                            .get::<_, Option<String>>(1)?
                            .map(BoardExternalId::from),
                        name: row.get(2)?,
                        position: row.get(3)?,
                        closed: row.get::<_, i64>(4)? != 0,
                    })
                },
            )
            .optional()
            .map_err(|err| CoreError::Persistence(err.to_string()))
    }

    fn find_card(&self, external_id: &CardExternalId) -> Result<Option<CardRecord>, CoreError> {
        self.conn
            .query_row(
                &format!("{SELECT_CARD_COLUMNS} WHERE c.external_id = ?1"),
                params![external_id.as_str()],
                Self::map_card_row,
            )
            .optional()
            .map_err(|err| CoreError::Persistence(err.to_string()))
    }

    fn movements_for_card(
        &self,
        card_external_id: &CardExternalId,
    ) -> Result<Vec<CardMovementRecord>, CoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT m.seq, c.external_id, l.external_id, m.member_external_id, m.occurred_at, m.idempotency_key
                FROM card_movements m
                JOIN cards c ON c.id = m.card_id
                JOIN lists l ON l.id = m.list_id
                WHERE c.external_id = ?1
                ORDER BY m.seq ASC
                ",
            )
            .map_err(|err| CoreError::Persistence(err.to_string()))?;

        let rows = stmt
            .query_map(params![card_external_id.as_str()], |row| {
                Ok(CardMovementRecord {
                    seq: row.get(0)?,
                    card_external_id: row.get::<_, String>(1)?.into(),
                    list_external_id: row.get::<_, String>(2)?.into(),
                    member_external_id: row
                        .get::<_, Option<String>>(3)?
                        .map(MemberExternalId::from),
                    occurred_at: row.get(4)?,
                    idempotency_key: row.get::<_, String>(5)?.into(),
                })
            })
            .map_err(|err| CoreError::Persistence(err.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|err| CoreError::Persistence(err.to_string()))
    }
}
