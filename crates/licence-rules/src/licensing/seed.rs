//! Reference data (parent categories, sub-categories, authorities) loaded from CSV.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};

use super::domain::{
    Authority, AuthorityId, ParentCategory, ParentCategoryId, SubCategory, SubCategoryId,
};
use super::memory::InMemoryLicenceStore;
use super::repository::{LicenceRepository, RepositoryError};

pub const PARENT_CATEGORIES_FILE: &str = "parent_categories.csv";
pub const SUB_CATEGORIES_FILE: &str = "sub_categories.csv";
pub const AUTHORITIES_FILE: &str = "authorities.csv";

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("unable to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed {file}: {source}")]
    Csv {
        file: &'static str,
        #[source]
        source: csv::Error,
    },
    #[error("unable to store reference data: {0}")]
    Store(#[from] RepositoryError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceSeed {
    pub parent_categories: Vec<ParentCategory>,
    pub sub_categories: Vec<SubCategory>,
    pub authorities: Vec<Authority>,
}

impl ReferenceSeed {
    /// Reads the three seed files from `dir`; `authorities.csv` may be absent.
    pub fn from_dir(dir: &Path) -> Result<Self, SeedError> {
        let open = |name: &str| {
            let path = dir.join(name);
            File::open(&path).map_err(|source| SeedError::Io { path, source })
        };

        let parents = open(PARENT_CATEGORIES_FILE)?;
        let subs = open(SUB_CATEGORIES_FILE)?;
        let authorities_path = dir.join(AUTHORITIES_FILE);

        let mut seed = Self {
            parent_categories: parse_parent_categories(parents)?,
            sub_categories: parse_sub_categories(subs)?,
            authorities: Vec::new(),
        };
        if authorities_path.exists() {
            seed.authorities = parse_authorities(open(AUTHORITIES_FILE)?)?;
        }
        Ok(seed)
    }

    pub fn from_readers<P, S, A>(parents: P, subs: S, authorities: A) -> Result<Self, SeedError>
    where
        P: Read,
        S: Read,
        A: Read,
    {
        Ok(Self {
            parent_categories: parse_parent_categories(parents)?,
            sub_categories: parse_sub_categories(subs)?,
            authorities: parse_authorities(authorities)?,
        })
    }

    /// Writes the seed into `store`, parents before the sub-categories that reference them.
    pub async fn apply(&self, store: &InMemoryLicenceStore) -> Result<(), SeedError> {
        for parent in &self.parent_categories {
            store.insert_parent_category(parent.clone())?;
        }
        for sub in &self.sub_categories {
            store.insert_sub_category(sub.clone())?;
        }
        for authority in &self.authorities {
            if store.find_authority(&authority.authority).await?.is_none() {
                store.save_authority(authority.clone()).await?;
            }
        }
        Ok(())
    }
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader)
}

#[derive(Debug, Deserialize)]
struct ParentRow {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubRow {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    parent_id: Option<i64>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    name: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    short_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthorityRow {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    authority: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    authority_name: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    state: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    link: Option<String>,
}

fn parse_parent_categories<R: Read>(reader: R) -> Result<Vec<ParentCategory>, SeedError> {
    let mut rows = Vec::new();
    for record in csv_reader(reader).deserialize::<ParentRow>() {
        let row = record.map_err(|source| SeedError::Csv {
            file: PARENT_CATEGORIES_FILE,
            source,
        })?;
        if let (Some(id), Some(name)) = (row.id, row.name) {
            rows.push(ParentCategory {
                id: ParentCategoryId(id),
                name,
            });
        }
    }
    Ok(rows)
}

fn parse_sub_categories<R: Read>(reader: R) -> Result<Vec<SubCategory>, SeedError> {
    let mut rows = Vec::new();
    for record in csv_reader(reader).deserialize::<SubRow>() {
        let row = record.map_err(|source| SeedError::Csv {
            file: SUB_CATEGORIES_FILE,
            source,
        })?;
        if let (Some(id), Some(parent_id), Some(name)) = (row.id, row.parent_id, row.name) {
            rows.push(SubCategory {
                id: SubCategoryId(id),
                parent_id: ParentCategoryId(parent_id),
                short_name: row.short_name.unwrap_or_else(|| name.clone()),
                name,
            });
        }
    }
    Ok(rows)
}

fn parse_authorities<R: Read>(reader: R) -> Result<Vec<Authority>, SeedError> {
    let mut rows = Vec::new();
    for record in csv_reader(reader).deserialize::<AuthorityRow>() {
        let row = record.map_err(|source| SeedError::Csv {
            file: AUTHORITIES_FILE,
            source,
        })?;
        let (Some(authority), Some(state)) = (row.authority, row.state) else {
            continue;
        };
        rows.push(Authority {
            id: row.id.map(AuthorityId),
            authority_name: row.authority_name.unwrap_or_else(|| authority.clone()),
            authority,
            state,
            link: row.link,
        });
    }
    Ok(rows)
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARENTS: &str = "id,name\n1,Air Conditioning\n2,Electrical\n,Orphan\n";
    const SUBS: &str = "id,parent_id,name,short_name\n10,2,Electrical Repairs,Repairs\n11,2,Data Cabling,\n12,,Dangling,Dangling\n";
    const AUTHORITIES: &str =
        "id,authority,authority_name,state,link\n,NSW Fair Trading,NSW Fair Trading,NSW,https://www.fairtrading.nsw.gov.au\n,,Nameless,VIC,\n";

    #[test]
    fn skips_rows_missing_mandatory_fields() {
        let seed = ReferenceSeed::from_readers(
            PARENTS.as_bytes(),
            SUBS.as_bytes(),
            AUTHORITIES.as_bytes(),
        )
        .expect("seed parses");

        assert_eq!(seed.parent_categories.len(), 2);
        assert_eq!(seed.sub_categories.len(), 2);
        assert_eq!(seed.authorities.len(), 1);
        assert_eq!(seed.sub_categories[1].short_name, "Data Cabling");
        assert_eq!(
            seed.authorities[0].link.as_deref(),
            Some("https://www.fairtrading.nsw.gov.au")
        );
    }

    #[tokio::test]
    async fn apply_populates_reference_tables() {
        let seed = ReferenceSeed::from_readers(
            PARENTS.as_bytes(),
            SUBS.as_bytes(),
            AUTHORITIES.as_bytes(),
        )
        .expect("seed parses");
        let store = InMemoryLicenceStore::new();
        seed.apply(&store).await.expect("seed applies");

        let repairs = store
            .find_sub_category_by_short_name(None, "Repairs")
            .await
            .expect("lookup succeeds")
            .expect("sub-category seeded");
        assert_eq!(repairs.parent_id, ParentCategoryId(2));
        assert!(store
            .find_authority("NSW Fair Trading")
            .await
            .expect("lookup succeeds")
            .is_some());
    }

    #[tokio::test]
    async fn sub_category_with_unknown_parent_is_rejected() {
        let seed = ReferenceSeed::from_readers(
            "id,name\n1,Plumbing\n".as_bytes(),
            "id,parent_id,name,short_name\n5,9,Gas Fitting,Gas\n".as_bytes(),
            "id,authority,authority_name,state,link\n".as_bytes(),
        )
        .expect("seed parses");
        let store = InMemoryLicenceStore::new();
        let error = seed.apply(&store).await.expect_err("foreign key enforced");
        assert!(matches!(
            error,
            SeedError::Store(RepositoryError::Reference { .. })
        ));
    }
}
