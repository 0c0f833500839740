use crate::{
    ConnectionSource, DataAccessError, DataAccessTemplate, IdentityProvider,
    IdentityProviderBuilder, IdentityProviderProperty, Parameters, QuerySpec,
    ResidentIdentityProvider, Result, RowLabeled,
};
use indoc::indoc;
use std::collections::BTreeMap;

const CREATE_IDP: &str = indoc! {"
    CREATE TABLE IF NOT EXISTS idp (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name VARCHAR(255) NOT NULL UNIQUE,
        display_name VARCHAR(255),
        description VARCHAR(1024),
        enabled BOOLEAN NOT NULL DEFAULT 1,
        jit_enabled BOOLEAN NOT NULL DEFAULT 0
    )
"};
const CREATE_IDP_PROPERTY: &str = indoc! {"
    CREATE TABLE IF NOT EXISTS idp_property (
        idp_id INTEGER NOT NULL REFERENCES idp(id),
        name VARCHAR(255) NOT NULL,
        value VARCHAR(2048) NOT NULL,
        PRIMARY KEY (idp_id, name, value)
    )
"};
const CREATE_IDP_PROVISIONING_IDP: &str = indoc! {"
    CREATE TABLE IF NOT EXISTS idp_provisioning_idp (
        idp_id INTEGER NOT NULL REFERENCES idp(id),
        provisioning_idp VARCHAR(255) NOT NULL,
        PRIMARY KEY (idp_id, provisioning_idp)
    )
"};

const INSERT_IDP: &str = indoc! {"
    INSERT INTO idp (name, display_name, description, enabled, jit_enabled)
    VALUES (?, ?, ?, ?, ?)
"};
const INSERT_IDP_PROPERTY: &str =
    "INSERT INTO idp_property (idp_id, name, value) VALUES (?, ?, ?)";
const INSERT_IDP_PROVISIONING_IDP: &str =
    "INSERT INTO idp_provisioning_idp (idp_id, provisioning_idp) VALUES (?, ?)";

const SELECT_IDP_BY_ID: &str = indoc! {"
    SELECT id, name, display_name, description, enabled, jit_enabled
    FROM idp
    WHERE id = ?
"};
const SELECT_IDP_BY_NAME: &str = indoc! {"
    SELECT id, name, display_name, description, enabled, jit_enabled
    FROM idp
    WHERE name = ?
"};
const SELECT_IDPS: &str = indoc! {"
    SELECT id, name, display_name, description, enabled, jit_enabled
    FROM idp
    ORDER BY id
"};
const SELECT_PROPERTIES: &str = "SELECT idp_id, name, value FROM idp_property";
const SELECT_PROPERTIES_BY_IDP: &str =
    "SELECT idp_id, name, value FROM idp_property WHERE idp_id = ?";
const SELECT_PROVISIONING_IDPS: &str =
    "SELECT idp_id, provisioning_idp FROM idp_provisioning_idp";
const SELECT_PROVISIONING_IDPS_BY_IDP: &str =
    "SELECT idp_id, provisioning_idp FROM idp_provisioning_idp WHERE idp_id = ?";

const UPDATE_IDP_ENABLED: &str = "UPDATE idp SET enabled = ? WHERE id = ?";
const DELETE_IDP_PROPERTIES: &str = "DELETE FROM idp_property WHERE idp_id = ?";
const DELETE_IDP_PROVISIONING_IDPS: &str = "DELETE FROM idp_provisioning_idp WHERE idp_id = ?";
const DELETE_IDP: &str = "DELETE FROM idp WHERE id = ?";

/// Persists identity providers through a [`DataAccessTemplate`].
#[derive(Debug, Clone)]
pub struct IdentityProviderDao<S: ConnectionSource> {
    template: DataAccessTemplate<S>,
}

type DaoResult<T> = std::result::Result<T, DataAccessError>;

fn map_identity_provider(row: &RowLabeled, _index: usize) -> Result<IdentityProviderBuilder> {
    let mut builder = IdentityProvider::builder(row.get_as("id")?, row.get_as::<String>("name")?)
        .enabled(row.get_as("enabled")?)
        .jit_enabled(row.get_as("jit_enabled")?);
    if let Some(display_name) = row.get_as::<Option<String>>("display_name")? {
        builder = builder.display_name(display_name);
    }
    if let Some(description) = row.get_as::<Option<String>>("description")? {
        builder = builder.description(description);
    }
    Ok(builder)
}

fn map_property(row: &RowLabeled, _index: usize) -> Result<(i64, IdentityProviderProperty)> {
    Ok((
        row.get_as("idp_id")?,
        IdentityProviderProperty::new(
            row.get_as::<String>("name")?,
            row.get_as::<String>("value")?,
        ),
    ))
}

fn map_provisioning_idp(row: &RowLabeled, _index: usize) -> Result<(i64, String)> {
    Ok((row.get_as("idp_id")?, row.get_as("provisioning_idp")?))
}

fn by_id(id: i64) -> impl Fn(&mut Parameters) -> Result<()> {
    move |parameters| {
        parameters.bind(id)?;
        Ok(())
    }
}

impl<S: ConnectionSource> IdentityProviderDao<S> {
    pub fn new(source: S) -> Self {
        Self {
            template: DataAccessTemplate::new(source),
        }
    }

    pub fn template(&self) -> &DataAccessTemplate<S> {
        &self.template
    }

    /// Create the tables when missing.
    pub fn create_schema(&self) -> DaoResult<()> {
        for sql in [CREATE_IDP, CREATE_IDP_PROPERTY, CREATE_IDP_PROVISIONING_IDP] {
            self.template.execute_update(sql)?;
        }
        Ok(())
    }

    /// Store a new identity provider, returning the id the database assigned.
    ///
    /// The id of `idp` itself is ignored.
    pub fn add(&self, idp: &IdentityProvider) -> DaoResult<i64> {
        let filter = |parameters: &mut Parameters| -> Result<()> {
            parameters
                .bind(idp.name())?
                .bind(idp.display_name().map(str::to_owned))?
                .bind(idp.description().map(str::to_owned))?
                .bind(idp.is_enabled())?
                .bind(idp.jit_provisioning().is_jit_enabled())?;
            Ok(())
        };
        let id = self
            .template
            .insert_returning_id(QuerySpec::new(INSERT_IDP).filter(&filter))?;
        log::debug!("Identity provider `{}` stored with id {}", idp.name(), id);
        for property in idp.properties() {
            let filter = |parameters: &mut Parameters| -> Result<()> {
                parameters
                    .bind(id)?
                    .bind(property.name.as_str())?
                    .bind(property.value.as_str())?;
                Ok(())
            };
            self.template
                .execute_insert(QuerySpec::new(INSERT_IDP_PROPERTY).filter(&filter), false)?;
        }
        for provisioning_idp in idp.jit_provisioning().provisioning_idps() {
            let filter = |parameters: &mut Parameters| -> Result<()> {
                parameters.bind(id)?.bind(provisioning_idp.as_str())?;
                Ok(())
            };
            self.template.execute_insert(
                QuerySpec::new(INSERT_IDP_PROVISIONING_IDP).filter(&filter),
                false,
            )?;
        }
        Ok(id)
    }

    pub fn get(&self, id: i64) -> DaoResult<Option<IdentityProvider>> {
        let filter = by_id(id);
        let builder = self.template.fetch_single(
            QuerySpec::new(SELECT_IDP_BY_ID).filter(&filter),
            map_identity_provider,
        )?;
        builder.map(|b| self.complete(id, b)).transpose()
    }

    pub fn get_by_name(&self, name: &str) -> DaoResult<Option<IdentityProvider>> {
        let filter = |parameters: &mut Parameters| -> Result<()> {
            parameters.bind(name)?;
            Ok(())
        };
        let builder = self.template.fetch_single(
            QuerySpec::new(SELECT_IDP_BY_NAME).filter(&filter),
            |row: &RowLabeled, index: usize| -> Result<(i64, IdentityProviderBuilder)> {
                Ok((row.get_as::<i64>("id")?, map_identity_provider(row, index)?))
            },
        )?;
        builder.map(|(id, b)| self.complete(id, b)).transpose()
    }

    /// The identity provider stored as [`ResidentIdentityProvider::NAME`].
    pub fn get_resident(&self) -> DaoResult<Option<ResidentIdentityProvider>> {
        Ok(self
            .get_by_name(ResidentIdentityProvider::NAME)?
            .map(Into::into))
    }

    /// Every identity provider ordered by id.
    pub fn list(&self) -> DaoResult<Vec<IdentityProvider>> {
        let builders = self.template.query(
            SELECT_IDPS,
            |row: &RowLabeled, index: usize| -> Result<(i64, IdentityProviderBuilder)> {
                Ok((row.get_as::<i64>("id")?, map_identity_provider(row, index)?))
            },
        )?;
        let mut properties = BTreeMap::<i64, Vec<IdentityProviderProperty>>::new();
        for (id, property) in self.template.query(SELECT_PROPERTIES, map_property)? {
            properties.entry(id).or_default().push(property);
        }
        let mut provisioning_idps = BTreeMap::<i64, Vec<String>>::new();
        for (id, idp) in self
            .template
            .query(SELECT_PROVISIONING_IDPS, map_provisioning_idp)?
        {
            provisioning_idps.entry(id).or_default().push(idp);
        }
        Ok(builders
            .into_iter()
            .map(|(id, builder)| {
                builder
                    .add_properties(properties.remove(&id).unwrap_or_default())
                    .add_provisioning_idps(provisioning_idps.remove(&id).unwrap_or_default())
                    .build()
            })
            .collect())
    }

    /// Enable or disable an identity provider, returns false if it does not exist.
    pub fn set_enabled(&self, id: i64, enabled: bool) -> DaoResult<bool> {
        let filter = |parameters: &mut Parameters| -> Result<()> {
            parameters.bind(enabled)?.bind(id)?;
            Ok(())
        };
        let affected = self
            .template
            .execute(QuerySpec::new(UPDATE_IDP_ENABLED).filter(&filter))?;
        Ok(affected.rows_affected > 0)
    }

    /// Remove an identity provider with its properties.
    pub fn delete(&self, id: i64) -> DaoResult<()> {
        let filter = by_id(id);
        for sql in [DELETE_IDP_PROPERTIES, DELETE_IDP_PROVISIONING_IDPS, DELETE_IDP] {
            self.template
                .execute_update(QuerySpec::new(sql).filter(&filter))?;
        }
        Ok(())
    }

    /// Attach the child rows of the identity provider `id`.
    fn complete(&self, id: i64, builder: IdentityProviderBuilder) -> DaoResult<IdentityProvider> {
        let filter = by_id(id);
        let properties = self.template.query(
            QuerySpec::new(SELECT_PROPERTIES_BY_IDP).filter(&filter),
            map_property,
        )?;
        let provisioning_idps = self.template.query(
            QuerySpec::new(SELECT_PROVISIONING_IDPS_BY_IDP).filter(&filter),
            map_provisioning_idp,
        )?;
        Ok(builder
            .add_properties(properties.into_iter().map(|(_, p)| p))
            .add_provisioning_idps(provisioning_idps.into_iter().map(|(_, p)| p))
            .build())
    }
}
