//! Unit-of-work over one SQLite transaction
//!
//! Records added to a `Session` are staged in memory and get their ids when
//! the session flushes: explicitly via `flush`, before every query, and at
//! `commit`. A person pointing at a staged website through its `Key` picks up
//! the website's real id at flush time, however early it was built.
//!
//! Dropping a session without committing rolls everything back.

use std::sync::atomic::{AtomicU64, Ordering};

use rusqlite::{params, params_from_iter, Transaction};

use crate::model::{Entity, Key, NewPerson, NewWebsite, Person, Website, WebsiteRef};
use crate::query::Query;
use crate::storage::{echo_sql, Schema};
use crate::{Error, Result};

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

const INSERT_WEBSITE: &str = "INSERT INTO websites (url) VALUES (?1)";
const INSERT_PERSON: &str = "INSERT INTO person (name, website_id) VALUES (?1, ?2)";

#[derive(Debug, Clone)]
enum Staged {
    Website(NewWebsite),
    Person(NewPerson),
}

impl Staged {
    fn table(&self) -> &'static str {
        match self {
            Staged::Website(_) => Website::TABLE,
            Staged::Person(_) => Person::TABLE,
        }
    }
}

#[derive(Debug)]
struct Slot {
    record: Staged,
    id: Option<i64>,
}

pub struct Session<'a> {
    tx: Transaction<'a>,
    schema: &'a Schema,
    echo: bool,
    tag: u64,
    slots: Vec<Slot>,
    /// Slots before this index are in the database
    flushed: usize,
    poisoned: bool,
}

impl<'a> Session<'a> {
    pub(crate) fn new(tx: Transaction<'a>, schema: &'a Schema, echo: bool) -> Self {
        let tag = NEXT_SESSION.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Session {} opened", tag);
        Self {
            tx,
            schema,
            echo,
            tag,
            slots: Vec::new(),
            flushed: 0,
            poisoned: false,
        }
    }

    pub fn schema(&self) -> &Schema {
        self.schema
    }

    // ========== Staging ==========

    pub fn add_website(&mut self, website: NewWebsite) -> Key<Website> {
        Key::new(self.tag, self.stage(Staged::Website(website)))
    }

    pub fn add_person(&mut self, person: NewPerson) -> Key<Person> {
        Key::new(self.tag, self.stage(Staged::Person(person)))
    }

    pub fn add_people(&mut self, people: impl IntoIterator<Item = NewPerson>) -> Vec<Key<Person>> {
        people.into_iter().map(|p| self.add_person(p)).collect()
    }

    fn stage(&mut self, record: Staged) -> usize {
        self.slots.push(Slot { record, id: None });
        self.slots.len() - 1
    }

    /// Number of staged records not yet written to the database
    pub fn pending(&self) -> usize {
        self.slots.len() - self.flushed
    }

    /// Store-assigned id of a staged record, `None` until it has been flushed
    pub fn id_of<E: Entity>(&self, key: Key<E>) -> Result<Option<i64>> {
        Ok(self.slot(key.session, key.slot, E::TABLE)?.id)
    }

    fn slot(&self, session: u64, slot: usize, table: &str) -> Result<&Slot> {
        if session != self.tag {
            return Err(Error::UnknownKey(slot));
        }
        self.slots
            .get(slot)
            .filter(|s| s.record.table() == table)
            .ok_or(Error::UnknownKey(slot))
    }

    // ========== Flush ==========

    /// Write every staged record, in the order staged, and record its id.
    ///
    /// On failure the session is poisoned: the rows written so far are still
    /// inside the open transaction and are discarded when the session ends.
    pub fn flush(&mut self) -> Result<()> {
        self.ensure_usable()?;

        while self.flushed < self.slots.len() {
            let index = self.flushed;
            match self.insert(index) {
                Ok(id) => {
                    self.slots[index].id = Some(id);
                    self.flushed += 1;
                }
                Err(e) => {
                    self.poisoned = true;
                    tracing::warn!("Flush failed at record {}: {}", index, e);
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    fn insert(&self, index: usize) -> Result<i64> {
        let record = &self.slots[index].record;
        self.require_table(record.table())?;

        match record {
            Staged::Website(website) => {
                echo_sql(self.echo, INSERT_WEBSITE);
                self.tx
                    .execute(INSERT_WEBSITE, params![website.url])
                    .map_err(Error::from_sqlite)?;
            }
            Staged::Person(person) => {
                let website_id = match person.website {
                    None => None,
                    Some(WebsiteRef::Id(id)) => Some(id),
                    Some(WebsiteRef::Staged(key)) => Some(self.resolve(key)?),
                };
                echo_sql(self.echo, INSERT_PERSON);
                self.tx
                    .execute(INSERT_PERSON, params![person.name, website_id])
                    .map_err(Error::from_sqlite)?;
            }
        }

        let id = self.tx.last_insert_rowid();
        tracing::debug!("Inserted {} id={}", record.table(), id);
        Ok(id)
    }

    /// Id of a staged website; it was staged earlier, so it is already flushed
    fn resolve(&self, key: Key<Website>) -> Result<i64> {
        self.slot(key.session, key.slot, Website::TABLE)?
            .id
            .ok_or(Error::UnknownKey(key.slot))
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.poisoned {
            return Err(Error::SessionPoisoned);
        }
        Ok(())
    }

    fn require_table(&self, table: &str) -> Result<()> {
        if !self.schema.contains(table) {
            return Err(Error::UnknownTable(table.to_string()));
        }
        Ok(())
    }

    // ========== Queries ==========

    /// All rows matching the query. Flushes first.
    pub fn all<E: Entity>(&mut self, query: &Query<E>) -> Result<Vec<E>> {
        self.flush()?;
        self.require_table(E::TABLE)?;

        let (sql, params) = query.to_sql();
        echo_sql(self.echo, &sql);
        let mut stmt = self.tx.prepare(&sql)?;

        let rows = stmt
            .query_map(params_from_iter(params), |row| E::from_row(row))?
            .collect::<rusqlite::Result<Vec<E>>>()?;

        Ok(rows)
    }

    /// First matching row by primary key, or `None`
    pub fn first<E: Entity>(&mut self, query: &Query<E>) -> Result<Option<E>> {
        let query = query.clone().limit(1);
        Ok(self.all(&query)?.into_iter().next())
    }

    pub fn count<E: Entity>(&mut self, query: &Query<E>) -> Result<usize> {
        self.flush()?;
        self.require_table(E::TABLE)?;

        let (sql, params) = query.to_count_sql();
        echo_sql(self.echo, &sql);
        let count: i64 = self
            .tx
            .query_row(&sql, params_from_iter(params), |row| row.get(0))?;

        Ok(count as usize)
    }

    /// Point lookup by primary key; a missing id is `None`, not an error
    pub fn get<E: Entity>(&mut self, id: i64) -> Result<Option<E>> {
        self.first(&Query::<E>::new().filter(E::ID, id))
    }

    /// The website a person visits, if it has one
    pub fn website_of(&mut self, person: &Person) -> Result<Option<Website>> {
        match person.website_id {
            Some(id) => self.get::<Website>(id),
            None => Ok(None),
        }
    }

    // ========== Release ==========

    /// Flush and commit as one unit.
    ///
    /// Foreign keys are checked here; a dangling `website_id` fails the commit
    /// and the whole unit is rolled back.
    pub fn commit(mut self) -> Result<()> {
        self.flush()?;
        echo_sql(self.echo, "COMMIT");
        let (tag, written) = (self.tag, self.flushed);
        self.tx.commit().map_err(Error::from_sqlite)?;
        tracing::info!("Session {} committed {} records", tag, written);
        Ok(())
    }

    /// Discard everything staged or flushed in this session
    pub fn close(self) -> Result<()> {
        echo_sql(self.echo, "ROLLBACK");
        tracing::debug!("Session {} closed, {} records discarded", self.tag, self.slots.len());
        self.tx.rollback()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PersonColumn;
    use crate::storage::Store;

    const URL: &str = "https://example.com";

    fn store() -> Store {
        let store = Store::open_in_memory().unwrap();
        store.create_all(&Schema::visitors()).unwrap();
        store
    }

    fn by_name(name: &str) -> Query<Person> {
        Query::new().filter(PersonColumn::Name, name)
    }

    #[test]
    fn test_jeff_visits_example_com() {
        let schema = Schema::visitors();
        let mut store = store();

        let mut session = store.session(&schema).unwrap();
        let site = session.add_website(NewWebsite::new(URL));
        session.flush().unwrap();
        let site_id = session.id_of(site).unwrap().unwrap();
        session.add_person(NewPerson::new("Jeff").visiting(site_id));
        session.commit().unwrap();

        let mut session = store.session(&schema).unwrap();
        let jeff = session.first(&by_name("Jeff")).unwrap().unwrap();
        assert_eq!(jeff.name, "Jeff");
        assert_eq!(jeff.website_id, Some(site_id));
        let website = session.website_of(&jeff).unwrap().unwrap();
        assert_eq!(website.url, URL);
    }

    #[test]
    fn test_staged_key_resolves_at_flush() {
        let schema = Schema::visitors();
        let mut store = store();
        let mut session = store.session(&schema).unwrap();

        let site = session.add_website(NewWebsite::new(URL));
        let people = session.add_people(
            ["Jeff", "Jeruska", "Bongani"].map(|name| NewPerson::new(name).visiting(site)),
        );
        assert_eq!(session.id_of(site).unwrap(), None);
        assert_eq!(session.pending(), 4);

        session.commit().unwrap();
        assert_eq!(people.len(), 3);

        let mut session = store.session(&schema).unwrap();
        let website = session.get::<Website>(1).unwrap().unwrap();
        for person in session.all(&Query::<Person>::new()).unwrap() {
            assert_eq!(person.website_id, Some(website.id));
        }
        assert_eq!(session.count(&Query::<Person>::new()).unwrap(), 3);
    }

    #[test]
    fn test_query_autoflushes() {
        let schema = Schema::visitors();
        let mut store = store();
        let mut session = store.session(&schema).unwrap();

        let site = session.add_website(NewWebsite::new(URL));
        let looked_up = session.get::<Website>(1).unwrap().unwrap();
        assert_eq!(session.id_of(site).unwrap(), Some(looked_up.id));
        assert_eq!(session.pending(), 0);
    }

    #[test]
    fn test_filter_returns_exact_person() {
        let schema = Schema::visitors();
        let mut store = store();
        let mut session = store.session(&schema).unwrap();

        let site = session.add_website(NewWebsite::new(URL));
        session.add_people(["Jeff", "Jeruska", "Bongani"].map(|n| NewPerson::new(n).visiting(site)));
        session.commit().unwrap();

        let mut session = store.session(&schema).unwrap();
        for name in ["Jeff", "Jeruska", "Bongani"] {
            let found = session.all(&by_name(name)).unwrap();
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].name, name);
        }
        assert!(session.first(&by_name("Nobody")).unwrap().is_none());
    }

    #[test]
    fn test_missing_id_is_none() {
        let schema = Schema::visitors();
        let mut store = store();
        let mut session = store.session(&schema).unwrap();
        assert!(session.get::<Website>(42).unwrap().is_none());
        assert!(session.get::<Person>(1).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_name_fails_commit_and_stores_nothing() {
        let schema = Schema::visitors();
        let mut store = store();

        let mut session = store.session(&schema).unwrap();
        let site = session.add_website(NewWebsite::new(URL));
        session.add_person(NewPerson::new("Jeff").visiting(site));
        session.add_person(NewPerson::new("Jeff").visiting(site));
        let err = session.commit().unwrap_err();
        assert!(matches!(err, Error::Constraint(_)), "{:?}", err);

        let mut session = store.session(&schema).unwrap();
        assert!(session.first(&by_name("Jeff")).unwrap().is_none());
        assert_eq!(session.count(&Query::<Person>::new()).unwrap(), 0);
        assert_eq!(session.count(&Query::<Website>::new()).unwrap(), 0);
    }

    #[test]
    fn test_failed_flush_poisons_session() {
        let schema = Schema::visitors();
        let mut store = store();
        let mut session = store.session(&schema).unwrap();

        session.add_people([NewPerson::new("Jeff"), NewPerson::new("Jeff")]);
        assert!(matches!(session.flush(), Err(Error::Constraint(_))));
        assert!(matches!(session.get::<Person>(1), Err(Error::SessionPoisoned)));
        assert!(matches!(session.commit(), Err(Error::SessionPoisoned)));

        let mut session = store.session(&schema).unwrap();
        assert_eq!(session.count(&Query::<Person>::new()).unwrap(), 0);
    }

    #[test]
    fn test_dangling_website_id_fails_commit() {
        let schema = Schema::visitors();
        let mut store = store();

        let mut session = store.session(&schema).unwrap();
        session.add_person(NewPerson::new("Jeff").visiting(99_i64));
        session.flush().unwrap();
        assert!(matches!(session.commit(), Err(Error::Constraint(_))));

        let mut session = store.session(&schema).unwrap();
        assert_eq!(session.count(&Query::<Person>::new()).unwrap(), 0);
    }

    #[test]
    fn test_person_without_website() {
        let schema = Schema::visitors();
        let mut store = store();
        let mut session = store.session(&schema).unwrap();

        session.add_person(NewPerson::new("Bongani"));
        let bongani = session.first(&by_name("Bongani")).unwrap().unwrap();
        assert_eq!(bongani.website_id, None);
        assert!(session.website_of(&bongani).unwrap().is_none());

        let loners = Query::<Person>::new().filter(PersonColumn::WebsiteId, None::<i64>);
        assert_eq!(session.count(&loners).unwrap(), 1);
    }

    #[test]
    fn test_close_discards_changes() {
        let schema = Schema::visitors();
        let mut store = store();

        let mut session = store.session(&schema).unwrap();
        session.add_website(NewWebsite::new(URL));
        session.flush().unwrap();
        session.close().unwrap();

        {
            let mut session = store.session(&schema).unwrap();
            session.add_website(NewWebsite::new(URL));
            session.flush().unwrap();
            // dropped without commit
        }

        let mut session = store.session(&schema).unwrap();
        assert_eq!(session.count(&Query::<Website>::new()).unwrap(), 0);
    }

    #[test]
    fn test_foreign_key_from_other_session_rejected() {
        let schema = Schema::visitors();
        let mut store = store();

        let foreign = {
            let mut session = store.session(&schema).unwrap();
            session.add_website(NewWebsite::new(URL))
        };

        let mut session = store.session(&schema).unwrap();
        assert!(matches!(session.id_of(foreign), Err(Error::UnknownKey(0))));
        session.add_person(NewPerson::new("Jeff").visiting(foreign));
        assert!(matches!(session.flush(), Err(Error::UnknownKey(0))));
    }

    #[test]
    fn test_table_outside_schema_rejected() {
        let websites_only = Schema::new().table(
            crate::storage::TableDef::new("websites")
                .column(crate::storage::ColumnDef::integer("id").primary_key())
                .column(crate::storage::ColumnDef::text("url").not_null()),
        );
        let mut store = store();
        let mut session = store.session(&websites_only).unwrap();
        assert!(matches!(
            session.all(&Query::<Person>::new()),
            Err(Error::UnknownTable(t)) if t == "person"
        ));
    }
}
