//! Entitlements and grants of roles, databases and tables.
//!
//! Table grant resolution runs
//! `shared check -> (owner only | raw grants -> resolve each -> owner fallback)`.
//! Nothing in here retries; a 422 on a lookup is a known outcome with its own
//! handling at each step. Any other error is returned, except on a grantee
//! user lookup, which only costs that user's grant.
use crate::database::{self, SYSTEM_OWNER};
use crate::errors::{SnowflakeError, SnowflakeResult};
use crate::listing::Connector;
use crate::pagination::{Page, PageToken};
use crate::resources::{
    entitlement_id, Entitlement, Grant, Resource, ResourceId, ResourceType, TableResource,
    ASSIGNED, OWNERSHIP,
};
use crate::role;
use crate::statement::StatementApi;
use crate::table;
use crate::user;

const GRANTED_TO_ROLE: &str = "ROLE";
const GRANTED_TO_USER: &str = "USER";

/// Grants of one resource, at most one per (principal, entitlement)
#[derive(Debug, Default)]
struct GrantSet {
    grants: Vec<Grant>,
}

impl GrantSet {
    fn contains(&self, principal: &ResourceId, entitlement_id: &str) -> bool {
        self.grants
            .iter()
            .any(|grant| grant.principal == *principal && grant.entitlement_id == entitlement_id)
    }

    fn add(&mut self, grant: Grant) {
        if !self.contains(&grant.principal, &grant.entitlement_id) {
            self.grants.push(grant);
        }
    }

    fn has_owner(&self) -> bool {
        self.grants.iter().any(|grant| grant.slug == OWNERSHIP)
    }
}

/// An owner name that can stand for a role
fn owner_role(owner: &str) -> Option<&str> {
    let owner = owner.trim();
    (!owner.is_empty() && !owner.eq_ignore_ascii_case(SYSTEM_OWNER)).then_some(owner)
}

impl<A: StatementApi> Connector<A> {
    /// A role has a single `assigned` entitlement, held by users and other roles
    pub fn role_entitlements(&self, role: &role::Role) -> Vec<Entitlement> {
        vec![Entitlement::assignment(
            role,
            ASSIGNED,
            &[ResourceType::User, ResourceType::AccountRole],
        )]
    }

    /// One page of the users and roles holding `role`
    pub async fn role_grants(&self, role: &str, token: &str) -> SnowflakeResult<Page<Grant>> {
        let offset = PageToken::offset(token)?;
        let limit = self.page_size();
        let grantees = role::list_role_grantees(self.api(), role, offset, limit).await?;
        let resource = ResourceId::role(role);
        let items = grantees
            .iter()
            .filter_map(|grantee| {
                let principal = match grantee.granted_to.as_str() {
                    GRANTED_TO_USER => ResourceId::user(&grantee.grantee_name),
                    GRANTED_TO_ROLE => ResourceId::role(&grantee.grantee_name),
                    _ => return None,
                };
                Some(Grant::new(&resource, ASSIGNED, principal))
            })
            .collect();
        Ok(Page {
            items,
            next_token: PageToken::after_offset(grantees.len(), limit, offset)?,
        })
    }

    /// Give `role` to a user. Only users can be granted roles here.
    pub async fn grant_role(&self, role: &str, principal: &ResourceId) -> SnowflakeResult<()> {
        let user = user_principal(principal)?;
        role::grant_role(self.api(), role, user).await.map_err(|err| {
            log::error!("Failed to grant account role {role} to user {user}: {err}");
            err
        })
    }

    /// Take back a role assignment produced by [`Connector::role_grants`]
    pub async fn revoke_role(&self, grant: &Grant) -> SnowflakeResult<()> {
        if grant.resource.resource_type != ResourceType::AccountRole {
            return Err(SnowflakeError::InvalidResourceId(grant.resource.to_string()));
        }
        let user = user_principal(&grant.principal)?;
        let role = grant.resource.resource.as_str();
        role::revoke_role(self.api(), role, user).await.map_err(|err| {
            log::error!("Failed to revoke account role {role} from user {user}: {err}");
            err
        })
    }

    /// A database has a single `ownership` entitlement
    pub fn database_entitlements(&self, database: &database::Database) -> Vec<Entitlement> {
        vec![Entitlement::assignment(database, OWNERSHIP, &[ResourceType::User])]
    }

    /// The owning role of a database, when it can be resolved
    pub async fn database_grants(&self, name: &str) -> SnowflakeResult<Vec<Grant>> {
        let database = match database::get_database(self.api(), name).await {
            Ok(Some(database)) => database,
            Ok(None) => {
                log::warn!("Database {name} not found");
                return Ok(Vec::new());
            }
            Err(err) if err.is_authorization_gap() => {
                err.log_gap(log::Level::Warn, &format!("SHOW DATABASES, database = {name}"));
                return Ok(Vec::new());
            }
            Err(err) => return Err(err),
        };
        let Some(owner) = owner_role(&database.owner) else {
            return Ok(Vec::new());
        };
        let mut grants = GrantSet::default();
        self.add_owner_grant(&mut grants, &ResourceId::database(name), owner)
            .await?;
        Ok(grants.grants)
    }

    /// Privileges granted on a table or view, plus `ownership`.
    ///
    /// Only `ownership` when the database is shared or system owned, or when
    /// the grants cannot be listed.
    pub async fn table_entitlements(
        &self,
        table: &TableResource,
    ) -> SnowflakeResult<Vec<Entitlement>> {
        let owner = Entitlement::assignment(table, OWNERSHIP, &[ResourceType::User]);
        if self.database_shared(table).await? {
            return Ok(vec![owner]);
        }
        let raw = match self.raw_table_grants(table).await? {
            Some(raw) => raw,
            None => return Ok(vec![owner]),
        };

        let mut privileges: Vec<String> = Vec::new();
        for grant in raw {
            if grant.granted_to != GRANTED_TO_ROLE && grant.granted_to != GRANTED_TO_USER {
                continue;
            }
            let privilege = grant.privilege.to_ascii_lowercase();
            if privilege != OWNERSHIP && !privileges.contains(&privilege) {
                privileges.push(privilege);
            }
        }
        let mut entitlements: Vec<Entitlement> = privileges
            .iter()
            .map(|privilege| {
                Entitlement::assignment(
                    table,
                    privilege,
                    &[ResourceType::User, ResourceType::AccountRole],
                )
            })
            .collect();
        entitlements.push(owner);
        Ok(entitlements)
    }

    /// Who holds which privilege on a table or view.
    ///
    /// Grants to roles carry an expandable annotation. A grantee role that
    /// cannot be described still gets its grant through a role id built from
    /// its name; a grantee user that cannot be found or described loses only
    /// that grant.
    /// Without an explicit `OWNERSHIP` row the table's owner field stands in.
    pub async fn table_grants(&self, table: &TableResource) -> SnowflakeResult<Vec<Grant>> {
        let resource = table.resource_id();
        let mut grants = GrantSet::default();

        if self.database_shared(table).await? {
            if let Some(owner) = owner_role(&table.table.owner) {
                grants.add(Grant::to_role(&resource, OWNERSHIP, owner));
            }
            return Ok(grants.grants);
        }

        for raw in self.raw_table_grants(table).await?.unwrap_or_default() {
            let slug = raw.privilege.to_ascii_lowercase();
            match raw.granted_to.as_str() {
                GRANTED_TO_ROLE => {
                    match role::get_role(self.api(), &raw.grantee_name).await {
                        Ok(Some(role)) => grants.add(Grant::to_role(&resource, &slug, &role.name)),
                        Ok(None) => {
                            log::debug!("Role {} of grant on {resource} not found", raw.grantee_name)
                        }
                        Err(err) if err.is_authorization_gap() => {
                            log::debug!(
                                "Role {} cannot be described, granting through its name",
                                raw.grantee_name
                            );
                            grants.add(Grant::to_role(&resource, &slug, &raw.grantee_name));
                        }
                        Err(err) => return Err(err),
                    }
                }
                GRANTED_TO_USER => match user::get_user(self.api(), &raw.grantee_name).await {
                    Ok(Some(user)) => {
                        grants.add(Grant::new(&resource, &slug, user.resource_id()))
                    }
                    Ok(None) => {
                        log::warn!("User {} of grant on {resource} not found", raw.grantee_name)
                    }
                    Err(err) => {
                        log::warn!(
                            "Skipping grant on {resource} to user {}: {err}",
                            raw.grantee_name
                        )
                    }
                },
                _ => {}
            }
        }

        if !grants.has_owner() {
            let listed = &table.table;
            let owner = match table::get_table(
                self.api(),
                &listed.database_name,
                &listed.schema_name,
                &listed.name,
            )
            .await?
            {
                Some(current) => current.owner,
                None => table.table.owner.clone(),
            };
            if let Some(owner) = owner_role(&owner) {
                self.add_owner_grant(&mut grants, &resource, owner).await?;
            }
        }
        Ok(grants.grants)
    }

    /// Resolve `owner` as a role and add its ownership grant; a role that
    /// cannot be described or is gone adds nothing
    async fn add_owner_grant(
        &self,
        grants: &mut GrantSet,
        resource: &ResourceId,
        owner: &str,
    ) -> SnowflakeResult<()> {
        match role::get_role(self.api(), owner).await {
            Ok(Some(role)) => {
                let principal = ResourceId::role(&role.name);
                if !grants.contains(&principal, &entitlement_id(resource, OWNERSHIP)) {
                    grants.add(Grant::to_role(resource, OWNERSHIP, &role.name));
                }
                Ok(())
            }
            Ok(None) => {
                log::warn!("Owner role {owner} of {resource} not found");
                Ok(())
            }
            Err(err) if err.is_authorization_gap() => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn database_shared(&self, table: &TableResource) -> SnowflakeResult<bool> {
        if let Some(shared) = table.database_shared {
            return Ok(shared);
        }
        let name = &table.table.database_name;
        match database::get_database(self.api(), name).await {
            Ok(Some(database)) => Ok(database.is_shared_or_system()),
            Ok(None) => Err(SnowflakeError::NotFound {
                kind: "database",
                name: name.clone(),
            }),
            Err(err) if err.is_authorization_gap() => Ok(true),
            Err(err) => Err(err),
        }
    }

    /// Raw grant rows, `None` when the listing was denied
    async fn raw_table_grants(
        &self,
        table: &TableResource,
    ) -> SnowflakeResult<Option<Vec<table::TableGrant>>> {
        let listed = &table.table;
        match table::list_table_grants(
            self.api(),
            &listed.database_name,
            &listed.schema_name,
            &listed.name,
            table.kind(),
        )
        .await
        {
            Ok(raw) => Ok(Some(raw)),
            Err(SnowflakeError::PermissionDenied { object, .. }) => {
                log::debug!("Falling back to the owner of {object}");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

fn user_principal(principal: &ResourceId) -> SnowflakeResult<&str> {
    if principal.resource_type == ResourceType::User {
        Ok(&principal.resource)
    } else {
        log::warn!("Account roles can only be granted to users, not {principal}");
        Err(SnowflakeError::InvalidPrincipal(format!(
            "account roles can only be granted to users, not {principal}"
        )))
    }
}
