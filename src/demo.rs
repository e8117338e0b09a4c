//! The visitors scenario
//!
//! One website, three people visiting it, then a lookup of Jeff and the
//! site he has been visiting.

use std::io::Write;

use crate::model::{NewPerson, NewWebsite, Person, PersonColumn, Website};
use crate::query::Query;
use crate::storage::{Schema, Store};
use crate::{Error, Result};

pub const DEMO_URL: &str = "https://example.com";
pub const DEMO_PEOPLE: [&str; 3] = ["Jeff", "Jeruska", "Bongani"];
pub const DEMO_LOOKUP: &str = "Jeff";

/// Run the scenario against `store`, writing the two result lines to `out`
pub fn run<W: Write>(store: &mut Store, out: &mut W) -> Result<()> {
    let schema = Schema::visitors();
    store.create_all(&schema)?;

    let mut session = store.session(&schema)?;

    let site = session.add_website(NewWebsite::new(DEMO_URL));

    // Informational only; flushes the website so it has an id
    if let Some(website) = session.get::<Website>(1)? {
        tracing::debug!("Website {} is {}", website.id, website.url);
    }

    session.add_people(DEMO_PEOPLE.map(|name| NewPerson::new(name).visiting(site)));

    let lookup = Query::<Person>::new().filter(PersonColumn::Name, DEMO_LOOKUP);
    let person = session
        .first(&lookup)?
        .ok_or_else(|| Error::NotFound(format!("person named {}", DEMO_LOOKUP)))?;
    let website = session
        .website_of(&person)?
        .ok_or_else(|| Error::NotFound(format!("website visited by {}", person.name)))?;

    writeln!(out, "{} has been visiting", person.name)?;
    writeln!(out, "{}", website.url)?;

    session.commit()?;
    Ok(())
}
