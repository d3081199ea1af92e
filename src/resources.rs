//! The resource / entitlement / grant model handed to the governance host.
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::database::Database;
use crate::role::Role;
use crate::secret::Secret;
use crate::table::Table;
use crate::user::User;

/// Entitlement slug for owning an object
pub const OWNERSHIP: &str = "ownership";
/// Entitlement slug for holding a role
pub const ASSIGNED: &str = "assigned";

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    User,
    AccountRole,
    Database,
    Table,
    Secret,
    RsaPublicKey,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::User => "user",
            ResourceType::AccountRole => "account_role",
            ResourceType::Database => "database",
            ResourceType::Table => "table",
            ResourceType::Secret => "secret",
            ResourceType::RsaPublicKey => "rsa_public_key",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId {
    pub resource_type: ResourceType,
    pub resource: String,
}

impl ResourceId {
    pub fn new(resource_type: ResourceType, resource: &str) -> ResourceId {
        ResourceId {
            resource_type,
            resource: resource.to_owned(),
        }
    }

    pub fn user(name: &str) -> ResourceId {
        ResourceId::new(ResourceType::User, name)
    }

    pub fn role(name: &str) -> ResourceId {
        ResourceId::new(ResourceType::AccountRole, name)
    }

    pub fn database(name: &str) -> ResourceId {
        ResourceId::new(ResourceType::Database, name)
    }

    /// Tables are identified as `<database>.<schema>.<table>`
    pub fn table(database: &str, schema: &str, table: &str) -> ResourceId {
        ResourceId::new(ResourceType::Table, &format!("{database}.{schema}.{table}"))
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.resource)
    }
}

/// `<type>:<resource>:<slug>`
pub fn entitlement_id(resource: &ResourceId, slug: &str) -> String {
    format!("{}:{}:{}", resource.resource_type, resource.resource, slug)
}

/// Something the host syncs as a resource
pub trait Resource {
    fn resource_id(&self) -> ResourceId;

    fn display_name(&self) -> String;

    fn parent_id(&self) -> Option<ResourceId> {
        None
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Entitlement {
    pub id: String,
    pub resource: ResourceId,
    pub slug: String,
    pub display_name: String,
    pub description: String,
    pub grantable_to: Vec<ResourceType>,
}

impl Entitlement {
    /// An assignment-style entitlement on `resource`
    pub fn assignment<R: Resource + ?Sized>(
        resource: &R,
        slug: &str,
        grantable_to: &[ResourceType],
    ) -> Entitlement {
        let id = resource.resource_id();
        let name = resource.display_name();
        let (display_name, description) = match slug {
            OWNERSHIP => (format!("Is owner of {name}"), format!("Is owned by {name}")),
            ASSIGNED => (
                format!("{name} account role {ASSIGNED}"),
                format!("Has {name} account role assigned"),
            ),
            privilege => (
                format!("{} on {name}", privilege.to_ascii_uppercase()),
                format!("Has {privilege} privilege on {name}"),
            ),
        };
        Entitlement {
            id: entitlement_id(&id, slug),
            resource: id,
            slug: slug.to_owned(),
            display_name,
            description,
            grantable_to: grantable_to.to_vec(),
        }
    }
}

/// Tells the host a grant to a role can be expanded into the role's holders
#[derive(Serialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct GrantExpandable {
    pub entitlement_ids: Vec<String>,
    pub shallow: bool,
    pub resource_type_ids: Vec<ResourceType>,
}

impl GrantExpandable {
    /// Expand through the `assigned` entitlement of `role`
    pub fn role(role: &str) -> GrantExpandable {
        GrantExpandable {
            entitlement_ids: vec![entitlement_id(&ResourceId::role(role), ASSIGNED)],
            shallow: true,
            resource_type_ids: vec![ResourceType::AccountRole, ResourceType::User],
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Grant {
    pub entitlement_id: String,
    pub resource: ResourceId,
    pub slug: String,
    pub principal: ResourceId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expandable: Option<GrantExpandable>,
}

impl Grant {
    pub fn new(resource: &ResourceId, slug: &str, principal: ResourceId) -> Grant {
        Grant {
            entitlement_id: entitlement_id(resource, slug),
            resource: resource.clone(),
            slug: slug.to_owned(),
            principal,
            expandable: None,
        }
    }

    /// A grant to a role, expandable into that role's holders
    pub fn to_role(resource: &ResourceId, slug: &str, role: &str) -> Grant {
        Grant {
            expandable: Some(GrantExpandable::role(role)),
            ..Grant::new(resource, slug, ResourceId::role(role))
        }
    }
}

impl Resource for Role {
    fn resource_id(&self) -> ResourceId {
        ResourceId::role(&self.name)
    }

    fn display_name(&self) -> String {
        self.name.clone()
    }
}

impl Resource for User {
    fn resource_id(&self) -> ResourceId {
        ResourceId::user(&self.name)
    }

    fn display_name(&self) -> String {
        self.display()
    }
}

impl Resource for Database {
    fn resource_id(&self) -> ResourceId {
        ResourceId::database(&self.name)
    }

    fn display_name(&self) -> String {
        self.name.clone()
    }
}

/// A table or view together with what its walk learned about the parent database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableResource {
    pub table: Table,
    /// `None` when not known; grant resolution then looks the database up
    pub database_shared: Option<bool>,
}

impl TableResource {
    pub fn new(table: Table, database_shared: bool) -> TableResource {
        TableResource {
            table,
            database_shared: Some(database_shared),
        }
    }

    /// TABLE unless the listing said otherwise
    pub fn kind(&self) -> &str {
        if self.table.kind.is_empty() {
            "TABLE"
        } else {
            &self.table.kind
        }
    }
}

impl Resource for TableResource {
    fn resource_id(&self) -> ResourceId {
        ResourceId::table(
            &self.table.database_name,
            &self.table.schema_name,
            &self.table.name,
        )
    }

    fn display_name(&self) -> String {
        self.table.name.clone()
    }

    fn parent_id(&self) -> Option<ResourceId> {
        Some(ResourceId::database(&self.table.database_name))
    }
}

impl Resource for Secret {
    fn resource_id(&self) -> ResourceId {
        ResourceId::new(
            ResourceType::Secret,
            &format!("{}-{}", self.database_name, self.name),
        )
    }

    fn display_name(&self) -> String {
        self.name.clone()
    }

    fn parent_id(&self) -> Option<ResourceId> {
        Some(ResourceId::database(&self.database_name))
    }
}

/// One of a user's two key-pair slots that holds a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaPublicKey {
    pub user: String,
    /// 1 or 2
    pub slot: u8,
    pub last_set: DateTime<Utc>,
}

impl Resource for RsaPublicKey {
    fn resource_id(&self) -> ResourceId {
        ResourceId::new(
            ResourceType::RsaPublicKey,
            &format!("{}-rsa_{}", self.user, self.slot),
        )
    }

    fn display_name(&self) -> String {
        format!("{}-rsa_{}", self.user, self.slot)
    }

    fn parent_id(&self) -> Option<ResourceId> {
        Some(ResourceId::user(&self.user))
    }
}
