//! Record kinds - websites and the people visiting them
//!
//! Each record kind comes in two shapes:
//! - the stored row (`Website`, `Person`) with its store-assigned `id`
//! - the insert form (`NewWebsite`, `NewPerson`) which has no id at all
//!
//! Many `Person` rows may point at one `Website` row through `website_id`.

use std::fmt;
use std::marker::PhantomData;

/// A column of an entity's table, named by a typed enum instead of a string.
pub trait Column: Copy + fmt::Debug + 'static {
    fn name(self) -> &'static str;
}

/// Mapping between a Rust record and its table.
pub trait Entity: Sized {
    type Column: Column;

    /// Table name, must match a table declared in the `Schema`
    const TABLE: &'static str;

    /// Primary key column
    const ID: Self::Column;

    /// Columns in the order `from_row` reads them
    fn columns() -> &'static [Self::Column];

    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self>;
}

/// Handle to a record staged in a `Session`.
///
/// The id behind a key is unknown until the session flushes; see
/// `Session::id_of`.
pub struct Key<E> {
    pub(crate) session: u64,
    pub(crate) slot: usize,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Key<E> {
    pub(crate) fn new(session: u64, slot: usize) -> Self {
        Self { session, slot, _entity: PhantomData }
    }
}

impl<E> Clone for Key<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for Key<E> {}

impl<E> PartialEq for Key<E> {
    fn eq(&self, other: &Self) -> bool {
        self.session == other.session && self.slot == other.slot
    }
}

impl<E> Eq for Key<E> {}

impl<E> fmt::Debug for Key<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({}#{})", self.session, self.slot)
    }
}

// ========== Website ==========

/// A stored website row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Website {
    pub id: i64,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebsiteColumn {
    Id,
    Url,
}

impl Column for WebsiteColumn {
    fn name(self) -> &'static str {
        match self {
            WebsiteColumn::Id => "id",
            WebsiteColumn::Url => "url",
        }
    }
}

impl Entity for Website {
    type Column = WebsiteColumn;
    const TABLE: &'static str = "websites";
    const ID: WebsiteColumn = WebsiteColumn::Id;

    fn columns() -> &'static [WebsiteColumn] {
        &[WebsiteColumn::Id, WebsiteColumn::Url]
    }

    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Website {
            id: row.get(0)?,
            url: row.get(1)?,
        })
    }
}

/// A website waiting to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWebsite {
    pub url: String,
}

impl NewWebsite {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

// ========== Person ==========

/// A stored person row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub website_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonColumn {
    Id,
    Name,
    WebsiteId,
}

impl Column for PersonColumn {
    fn name(self) -> &'static str {
        match self {
            PersonColumn::Id => "id",
            PersonColumn::Name => "name",
            PersonColumn::WebsiteId => "website_id",
        }
    }
}

impl Entity for Person {
    type Column = PersonColumn;
    const TABLE: &'static str = "person";
    const ID: PersonColumn = PersonColumn::Id;

    fn columns() -> &'static [PersonColumn] {
        &[PersonColumn::Id, PersonColumn::Name, PersonColumn::WebsiteId]
    }

    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Person {
            id: row.get(0)?,
            name: row.get(1)?,
            website_id: row.get(2)?,
        })
    }
}

/// How a new person points at its website.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebsiteRef {
    /// A website already in the store
    Id(i64),
    /// A website staged in the same session; resolved to its id on flush
    Staged(Key<Website>),
}

impl From<i64> for WebsiteRef {
    fn from(id: i64) -> Self {
        WebsiteRef::Id(id)
    }
}

impl From<Key<Website>> for WebsiteRef {
    fn from(key: Key<Website>) -> Self {
        WebsiteRef::Staged(key)
    }
}

/// A person waiting to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPerson {
    pub name: String,
    pub website: Option<WebsiteRef>,
}

impl NewPerson {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), website: None }
    }

    /// Point this person at a website, either staged or already stored
    pub fn visiting(mut self, website: impl Into<WebsiteRef>) -> Self {
        self.website = Some(website.into());
        self
    }
}
