use crate::database::{self, Database};
use crate::errors::{SnowflakeError, SnowflakeResult};
use crate::pagination::{Bag, Frame, Page, PageToken};
use crate::resources::{RsaPublicKey, TableResource};
use crate::role::{self, Role};
use crate::secret::{self, Secret};
use crate::statement::StatementApi;
use crate::table::{self, INFORMATION_SCHEMA};
use crate::user::{self, User};
use crate::SnowflakeClient;

/// Page size of flat listings and role grantee pages
pub const RESOURCE_PAGE_SIZE: usize = 50;
/// Page size of tables within one schema
pub const TABLE_PAGE_SIZE: usize = 200;

/// Paged listings and grant resolution over one warehouse.
///
/// Holds no state between calls: everything a walk needs to resume travels
/// in the page token.
#[derive(Debug, Clone)]
pub struct Connector<A = SnowflakeClient> {
    api: A,
    sync_secrets: bool,
    page_size: usize,
    table_page_size: usize,
}

impl<A: StatementApi> Connector<A> {
    pub fn new(api: A) -> Connector<A> {
        Connector {
            api,
            sync_secrets: false,
            page_size: RESOURCE_PAGE_SIZE,
            table_page_size: TABLE_PAGE_SIZE,
        }
    }

    /// Also list secrets of databases and key-pair slots of users
    pub fn with_sync_secrets(mut self, sync_secrets: bool) -> Connector<A> {
        self.sync_secrets = sync_secrets;
        self
    }

    pub fn with_page_sizes(mut self, page_size: usize, table_page_size: usize) -> Connector<A> {
        self.page_size = page_size.max(1);
        self.table_page_size = table_page_size.max(1);
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn sync_secrets(&self) -> bool {
        self.sync_secrets
    }

    pub(crate) fn page_size(&self) -> usize {
        self.page_size
    }

    pub async fn list_roles(&self, token: &str) -> SnowflakeResult<Page<Role>> {
        let cursor = PageToken::cursor(token)?;
        let roles = role::list_roles(&self.api, cursor.as_deref(), self.page_size).await?;
        let next_token = PageToken::after_flat(
            roles.len(),
            self.page_size,
            roles.last().map(|role| role.name.as_str()),
        )?;
        Ok(Page {
            items: roles,
            next_token,
        })
    }

    pub async fn list_users(&self, token: &str) -> SnowflakeResult<Page<User>> {
        let cursor = PageToken::cursor(token)?;
        let users = user::list_users(&self.api, cursor.as_deref(), self.page_size).await?;
        let next_token = PageToken::after_flat(
            users.len(),
            self.page_size,
            users.last().map(|user| user.name.as_str()),
        )?;
        Ok(Page {
            items: users,
            next_token,
        })
    }

    pub async fn list_databases(&self, token: &str) -> SnowflakeResult<Page<Database>> {
        let cursor = PageToken::cursor(token)?;
        let databases =
            database::list_databases(&self.api, cursor.as_deref(), self.page_size).await?;
        let next_token = PageToken::after_flat(
            databases.len(),
            self.page_size,
            databases.last().map(|database| database.name.as_str()),
        )?;
        Ok(Page {
            items: databases,
            next_token,
        })
    }

    /// One page of the tables of a database, walking its schemas in order.
    ///
    /// The first call lists the schemas and stacks them in the token along
    /// with whether the database is shared, so later pages never ask again.
    /// A schema that runs dry is dropped and the walk moves on to the next
    /// one within the same call, so only the final page comes back empty.
    pub async fn list_tables(
        &self,
        database: &str,
        token: &str,
    ) -> SnowflakeResult<Page<TableResource>> {
        let mut bag = Bag::from_token(token)?;
        if bag.is_empty() {
            if !token.is_empty() {
                return Ok(Page::last(Vec::new()));
            }
            bag = self.schema_bag(database).await?;
        }

        while let Some(frame) = bag.current().cloned() {
            let listed = table::list_tables_in_schema(
                &self.api,
                database,
                &frame.scope,
                frame.cursor.as_deref(),
                self.table_page_size,
            )
            .await;
            let (tables, cursor) = match listed {
                Ok(listed) => listed,
                Err(SnowflakeError::PermissionDenied { object, message }) => {
                    log::warn!("Skipping tables of {object}: {message}");
                    (Vec::new(), None)
                }
                Err(err) => return Err(err),
            };
            if tables.is_empty() && cursor.is_none() {
                bag.pop();
                continue;
            }
            let items = tables
                .into_iter()
                .map(|table| TableResource::new(table, frame.shared))
                .collect();
            return Ok(Page {
                items,
                next_token: bag.next_token(cursor)?,
            });
        }
        Ok(Page::last(Vec::new()))
    }

    async fn schema_bag(&self, database: &str) -> SnowflakeResult<Bag> {
        let shared = match database::get_database(&self.api, database).await {
            Ok(found) => found.map(|db| db.is_shared_or_system()).unwrap_or(false),
            Err(err) if err.is_authorization_gap() => true,
            Err(err) => return Err(err),
        };
        let schemas = table::list_schemas_in_database(&self.api, database).await?;
        let mut bag = Bag::default();
        for schema in schemas.iter().rev() {
            if schema.name.eq_ignore_ascii_case(INFORMATION_SCHEMA) {
                continue;
            }
            bag.push(Frame::new(&schema.name, shared));
        }
        Ok(bag)
    }

    /// Secrets of one database, when secret sync is enabled
    pub async fn list_secrets(&self, database: &str) -> SnowflakeResult<Page<Secret>> {
        if !self.sync_secrets {
            return Ok(Page::last(Vec::new()));
        }
        Ok(Page::last(secret::list_secrets(&self.api, database).await?))
    }

    /// The key-pair slots of one user that hold a key, when secret sync is enabled
    pub async fn list_user_keys(&self, user: &str) -> SnowflakeResult<Page<RsaPublicKey>> {
        if !self.sync_secrets {
            return Ok(Page::last(Vec::new()));
        }
        let material = match secret::user_key_material(&self.api, user).await {
            Ok(material) => material,
            Err(err) if err.is_authorization_gap() => {
                err.log_gap(log::Level::Warn, &format!("DESCRIBE USER, user = {user}"));
                return Ok(Page::last(Vec::new()));
            }
            Err(err) => return Err(err),
        };
        log::debug!("Key material of {user}: {material:?}");
        let keys = material
            .slots()
            .map(|(slot, last_set)| RsaPublicKey {
                user: user.to_owned(),
                slot,
                last_set,
            })
            .collect();
        Ok(Page::last(keys))
    }
}
