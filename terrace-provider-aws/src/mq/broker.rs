//! Amazon MQ broker
//!
//! Users are managed through their own API calls and reconciled by
//! username. Passwords are never returned by AWS, so the state keeps the
//! declared ones. RabbitMQ brokers only accept users at creation time.

use std::collections::HashMap;
use std::time::Duration;

use aws_sdk_mq::operation::describe_broker::DescribeBrokerOutput;
use aws_sdk_mq::types::{
    AuthenticationStrategy, BrokerInstance, BrokerStorageType, ConfigurationId, DayOfWeek,
    DeploymentMode, EncryptionOptions, EngineType, Logs, User, WeeklyStartTime,
};
use terrace_core::differ::Changes;
use terrace_core::provider::{ProviderError, ProviderResult};
use terrace_core::resource::{Resource, ResourceId, State, Value};
use terrace_core::tags::KeyValueTags;
use terrace_core::waiter::{Refresh, StateChangeConf};

use crate::{AwsProvider, read_created};
use crate::attrs::{
    Attrs, Finish, OptionalMember, block, bool_of, put, string_list, string_of,
};
use crate::error::{deleted, found, missing, sdk_error};
use crate::schemas::mq::broker_schema;
use crate::schemas::types::normalize_engine_type;
use crate::tags::tags_request;

const CREATE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const DELETE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const REBOOT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

const STATE_RUNNING: &str = "RUNNING";
const STATE_CREATION_IN_PROGRESS: &str = "CREATION_IN_PROGRESS";
const STATE_CREATION_FAILED: &str = "CREATION_FAILED";
const STATE_DELETION_IN_PROGRESS: &str = "DELETION_IN_PROGRESS";
const STATE_REBOOT_IN_PROGRESS: &str = "REBOOT_IN_PROGRESS";

const ENGINE_RABBITMQ: &str = "RABBITMQ";

/// Broker settings changed through UpdateBroker
const UPDATABLE: &[&str] = &[
    "authentication_strategy",
    "auto_minor_version_upgrade",
    "configuration",
    "engine_version",
    "host_instance_type",
    "logs",
    "maintenance_window_start_time",
    "security_groups",
];

/// Of those, the ones that only take effect after a reboot
const APPLIED_ON_REBOOT: &[&str] = &[
    "authentication_strategy",
    "configuration",
    "engine_version",
    "host_instance_type",
    "logs",
    "security_groups",
];

/// A broker user as declared, or as read back without its password
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UserSpec {
    pub username: String,
    pub password: Option<String>,
    pub console_access: bool,
    pub groups: Vec<String>,
    pub replication_user: bool,
}

impl UserSpec {
    pub(crate) fn from_attrs(attrs: &Attrs<'_>) -> ProviderResult<Self> {
        let mut groups = attrs.strings("groups");
        groups.sort();
        Ok(Self {
            username: attrs.required_str("username")?.to_string(),
            password: attrs.string("password"),
            console_access: attrs.bool("console_access").unwrap_or(false),
            groups,
            replication_user: attrs.bool("replication_user").unwrap_or(false),
        })
    }

    fn to_user(&self) -> ProviderResult<User> {
        let password = self.password.clone().ok_or_else(|| {
            ProviderError::validation(format!("user {}: password is required", self.username))
        })?;
        User::builder()
            .username(&self.username)
            .password(password)
            .console_access(self.console_access)
            .set_groups((!self.groups.is_empty()).then(|| self.groups.clone()))
            .replication_user(self.replication_user)
            .build()
            .finish("MQ user")
    }

    fn to_value(&self) -> Value {
        let mut fields = HashMap::from([
            ("username".to_string(), Value::from(self.username.as_str())),
            ("console_access".to_string(), Value::Bool(self.console_access)),
            ("groups".to_string(), string_list(&self.groups)),
            ("replication_user".to_string(), Value::Bool(self.replication_user)),
        ]);
        if let Some(password) = &self.password {
            fields.insert("password".to_string(), Value::from(password.as_str()));
        }
        block(fields)
    }
}

impl UserSpec {
    /// Same settings as `other`. Passwords only count when both sides carry
    /// one, since AWS never returns them.
    fn matches(&self, other: &UserSpec) -> bool {
        let passwords_match = match (&self.password, &other.password) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        };
        self.username == other.username
            && self.console_access == other.console_access
            && self.groups == other.groups
            && self.replication_user == other.replication_user
            && passwords_match
    }
}

pub(crate) fn user_specs(attrs: &Attrs<'_>) -> ProviderResult<Vec<UserSpec>> {
    attrs
        .blocks("users")
        .iter()
        .map(UserSpec::from_attrs)
        .collect()
}

/// User API calls needed to go from `old` to `new`
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct UserChanges {
    pub create: Vec<UserSpec>,
    pub update: Vec<UserSpec>,
    pub delete: Vec<String>,
}

impl UserChanges {
    pub(crate) fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }
}

pub(crate) fn user_changes(old: &[UserSpec], new: &[UserSpec]) -> UserChanges {
    let mut changes = UserChanges::default();
    for user in new {
        match old.iter().find(|u| u.username == user.username) {
            None => changes.create.push(user.clone()),
            Some(previous) if !previous.matches(user) => changes.update.push(user.clone()),
            Some(_) => {}
        }
    }
    changes.delete = old
        .iter()
        .filter(|u| !new.iter().any(|n| n.username == u.username))
        .map(|u| u.username.clone())
        .collect();
    changes
}

/// What an update has to do, decided from the previous state and the declaration
#[derive(Debug)]
pub(crate) struct BrokerUpdatePlan {
    pub changes: Changes,
    /// An UpdateBroker call is needed
    pub update_settings: bool,
    pub users: UserChanges,
    /// User changes were requested on a RabbitMQ broker and are ignored
    pub skipped_users: bool,
    pub needs_reboot: bool,
    /// Reboot as part of this update rather than at the maintenance window
    pub reboot_now: bool,
}

pub(crate) fn broker_update_plan(
    from: &HashMap<String, Value>,
    to: &HashMap<String, Value>,
) -> ProviderResult<BrokerUpdatePlan> {
    let changes = Changes::for_schema(from, to, &broker_schema());
    let attrs = Attrs::new(to);
    let mut needs_reboot = changes.has_any(APPLIED_ON_REBOOT);

    let rabbitmq = attrs
        .str("engine_type")
        .map(normalize_engine_type)
        .is_some_and(|engine| engine == ENGINE_RABBITMQ);
    let mut users = UserChanges::default();
    let mut skipped_users = false;
    if changes.has("users") {
        if rabbitmq {
            skipped_users = true;
        } else {
            users = user_changes(&user_specs(&Attrs::new(from))?, &user_specs(&attrs)?);
            needs_reboot |= !users.is_empty();
        }
    }

    Ok(BrokerUpdatePlan {
        update_settings: changes.has_any(UPDATABLE),
        reboot_now: needs_reboot && attrs.bool("apply_immediately").unwrap_or(false),
        changes,
        users,
        skipped_users,
        needs_reboot,
    })
}

/// Carry declared passwords over to users read back from AWS
pub(crate) fn merge_declared_users(state: &mut State, declared: &[UserSpec]) {
    let users: Vec<Value> = match state.attributes.get("users").and_then(Value::as_list) {
        Some(read) => read
            .iter()
            .filter_map(Value::as_map)
            .filter_map(|fields| UserSpec::from_attrs(&Attrs::new(fields)).ok())
            .map(|mut user| {
                user.password = declared
                    .iter()
                    .find(|d| d.username == user.username)
                    .and_then(|d| d.password.clone());
                user.to_value()
            })
            .collect(),
        None => declared.iter().map(UserSpec::to_value).collect(),
    };
    state.attributes.insert("users".to_string(), Value::List(users));
}

fn expand_configuration(attrs: &Attrs<'_>) -> ProviderResult<Option<ConfigurationId>> {
    attrs
        .block("configuration")
        .map(|b| {
            ConfigurationId::builder()
                .id(b.required_str("id")?)
                .set_revision(b.int32("revision")?)
                .build()
                .finish("MQ configuration reference")
        })
        .transpose()
}

fn expand_encryption_options(attrs: &Attrs<'_>) -> ProviderResult<Option<EncryptionOptions>> {
    attrs
        .block("encryption_options")
        .map(|b| {
            EncryptionOptions::builder()
                .set_kms_key_id(b.string("kms_key_id"))
                .use_aws_owned_key(b.bool("use_aws_owned_key").unwrap_or(true))
                .build()
                .finish("MQ encryption options")
        })
        .transpose()
}

fn expand_logs(attrs: &Attrs<'_>) -> ProviderResult<Option<Logs>> {
    attrs
        .block("logs")
        .map(|b| {
            Logs::builder()
                .set_general(b.bool("general"))
                .set_audit(b.bool("audit"))
                .build()
                .finish("MQ logs")
        })
        .transpose()
}

fn expand_maintenance_window(attrs: &Attrs<'_>) -> ProviderResult<Option<WeeklyStartTime>> {
    attrs
        .block("maintenance_window_start_time")
        .map(|b| {
            WeeklyStartTime::builder()
                .day_of_week(DayOfWeek::from(b.required_str("day_of_week")?))
                .time_of_day(b.required_str("time_of_day")?)
                .set_time_zone(b.string("time_zone"))
                .build()
                .finish("MQ maintenance window")
        })
        .transpose()
}

fn flatten_instances(instances: &[BrokerInstance]) -> Value {
    Value::List(
        instances
            .iter()
            .map(|i| {
                let mut fields = HashMap::new();
                put(&mut fields, "console_url", i.console_url());
                put(&mut fields, "ip_address", i.ip_address());
                fields.insert(
                    "endpoints".to_string(),
                    string_list(i.endpoints().optional().unwrap_or_default()),
                );
                block(fields)
            })
            .collect(),
    )
}

/// RabbitMQ users live in the broker itself and cannot be described
pub(crate) fn lists_users(output: &DescribeBrokerOutput) -> bool {
    string_of(output.engine_type()).as_deref() != Some(ENGINE_RABBITMQ)
}

pub(crate) fn flatten_broker(output: &DescribeBrokerOutput) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();
    put(&mut attributes, "arn", output.broker_arn());
    put(&mut attributes, "broker_id", output.broker_id());
    put(&mut attributes, "broker_name", output.broker_name());
    put(&mut attributes, "engine_type", output.engine_type());
    put(&mut attributes, "engine_version", output.engine_version());
    put(&mut attributes, "host_instance_type", output.host_instance_type());
    put(&mut attributes, "deployment_mode", output.deployment_mode());
    put(&mut attributes, "publicly_accessible", output.publicly_accessible());
    put(&mut attributes, "storage_type", output.storage_type());
    put(&mut attributes, "authentication_strategy", output.authentication_strategy());
    put(
        &mut attributes,
        "auto_minor_version_upgrade",
        output.auto_minor_version_upgrade(),
    );
    put(
        &mut attributes,
        "pending_data_replication_mode",
        output.pending_data_replication_mode(),
    );
    attributes.insert(
        "subnet_ids".to_string(),
        string_list(output.subnet_ids().optional().unwrap_or_default()),
    );
    attributes.insert(
        "security_groups".to_string(),
        string_list(output.security_groups().optional().unwrap_or_default()),
    );
    attributes.insert(
        "instances".to_string(),
        flatten_instances(output.broker_instances().optional().unwrap_or_default()),
    );

    if let Some(current) = output.configurations().and_then(|c| c.current()) {
        let mut fields = HashMap::new();
        put(&mut fields, "id", current.id());
        put(&mut fields, "revision", current.revision());
        attributes.insert("configuration".to_string(), block(fields));
    }
    if let Some(encryption) = output.encryption_options() {
        let mut fields = HashMap::new();
        put(&mut fields, "kms_key_id", encryption.kms_key_id());
        put(&mut fields, "use_aws_owned_key", encryption.use_aws_owned_key());
        attributes.insert("encryption_options".to_string(), block(fields));
    }
    if let Some(logs) = output.logs() {
        let mut fields = HashMap::new();
        put(&mut fields, "general", logs.general());
        put(&mut fields, "audit", logs.audit());
        attributes.insert("logs".to_string(), block(fields));
    }
    if let Some(window) = output.maintenance_window_start_time() {
        let mut fields = HashMap::new();
        put(&mut fields, "day_of_week", window.day_of_week());
        put(&mut fields, "time_of_day", window.time_of_day());
        put(&mut fields, "time_zone", window.time_zone());
        attributes.insert("maintenance_window_start_time".to_string(), block(fields));
    }
    attributes
}

impl AwsProvider {
    async fn find_mq_broker(&self, broker_id: &str) -> ProviderResult<Option<DescribeBrokerOutput>> {
        let result = self.mq.describe_broker().broker_id(broker_id).send().await;
        found(result, format!("reading MQ Broker ({})", broker_id))
    }

    async fn mq_broker_status(&self, broker_id: &str) -> Refresh<DescribeBrokerOutput> {
        Ok(self.find_mq_broker(broker_id).await?.map(|output| {
            let state = string_of(output.broker_state()).unwrap_or_default();
            (output, state)
        }))
    }

    async fn wait_mq_broker_running(
        &self,
        broker_id: &str,
        pending: &[&str],
        timeout: Duration,
    ) -> ProviderResult<()> {
        StateChangeConf::new(pending, &[STATE_RUNNING], timeout)
            .wait(|| self.mq_broker_status(broker_id))
            .await?;
        Ok(())
    }

    async fn mq_broker_users(&self, output: &DescribeBrokerOutput) -> ProviderResult<Vec<UserSpec>> {
        let broker_id = string_of(output.broker_id()).unwrap_or_default();
        let mut users = Vec::new();
        for summary in output.users().optional().unwrap_or_default() {
            let Some(username) = string_of(summary.username()) else {
                continue;
            };
            let user = self
                .mq
                .describe_user()
                .broker_id(&broker_id)
                .username(&username)
                .send()
                .await
                .map_err(|e| {
                    sdk_error(format!("reading MQ Broker ({}) user ({})", broker_id, username), e)
                })?;
            let mut groups: Vec<String> = user.groups().optional().unwrap_or_default().to_vec();
            groups.sort();
            users.push(UserSpec {
                username,
                password: None,
                console_access: bool_of(user.console_access()).unwrap_or(false),
                groups,
                replication_user: bool_of(user.replication_user()).unwrap_or(false),
            });
        }
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    /// Users without passwords, for engines whose users are managed through the API
    async fn put_mq_broker_users(
        &self,
        output: &DescribeBrokerOutput,
        attributes: &mut HashMap<String, Value>,
    ) -> ProviderResult<()> {
        if lists_users(output) {
            let users = self.mq_broker_users(output).await?;
            attributes.insert(
                "users".to_string(),
                Value::List(users.iter().map(UserSpec::to_value).collect()),
            );
        }
        Ok(())
    }

    pub(crate) async fn read_mq_broker(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<State> {
        let Some(output) = self.find_mq_broker(identifier).await? else {
            log::warn!("MQ Broker ({}) not found, removing from state", identifier);
            return Ok(State::not_found(id.clone()));
        };

        let mut attributes = flatten_broker(&output);
        self.put_mq_broker_users(&output, &mut attributes).await?;
        let tags = output.tags().map(KeyValueTags::from).unwrap_or_default();
        self.tags.apply(&mut attributes, tags);

        Ok(State::existing(id.clone(), attributes).with_identifier(identifier))
    }

    pub(crate) async fn create_mq_broker(&self, resource: Resource) -> ProviderResult<State> {
        let attrs = Attrs::new(&resource.attributes);
        let name = attrs.required_str("broker_name")?;
        let context = format!("creating MQ Broker ({})", name);
        let declared = user_specs(&attrs)?;
        let users = declared
            .iter()
            .map(UserSpec::to_user)
            .collect::<ProviderResult<Vec<_>>>()?;
        let engine_type = normalize_engine_type(attrs.required_str("engine_type")?);
        let subnet_ids = attrs.strings("subnet_ids");
        let security_groups = attrs.strings("security_groups");
        log::debug!("Creating MQ Broker: {} ({})", name, engine_type);

        let output = self
            .mq
            .create_broker()
            .broker_name(name)
            .engine_type(EngineType::from(engine_type.as_str()))
            .engine_version(attrs.required_str("engine_version")?)
            .host_instance_type(attrs.required_str("host_instance_type")?)
            .set_deployment_mode(attrs.str("deployment_mode").map(DeploymentMode::from))
            .publicly_accessible(attrs.bool("publicly_accessible").unwrap_or(false))
            .set_subnet_ids((!subnet_ids.is_empty()).then_some(subnet_ids))
            .set_security_groups((!security_groups.is_empty()).then_some(security_groups))
            .set_storage_type(attrs.str("storage_type").map(BrokerStorageType::from))
            .set_authentication_strategy(
                attrs
                    .str("authentication_strategy")
                    .map(AuthenticationStrategy::from),
            )
            .auto_minor_version_upgrade(attrs.bool("auto_minor_version_upgrade").unwrap_or(false))
            .set_configuration(expand_configuration(&attrs)?)
            .set_encryption_options(expand_encryption_options(&attrs)?)
            .set_logs(expand_logs(&attrs)?)
            .set_maintenance_window_start_time(expand_maintenance_window(&attrs)?)
            .set_users(Some(users))
            .set_tags(tags_request(self.tags.desired(&resource.attributes)))
            .send()
            .await
            .map_err(|e| sdk_error(&context, e))?;
        let broker_id = output
            .broker_id()
            .ok_or_else(|| missing(&context, "broker ID"))?
            .to_string();

        self.wait_mq_broker_running(
            &broker_id,
            &[STATE_CREATION_IN_PROGRESS, STATE_REBOOT_IN_PROGRESS],
            CREATE_TIMEOUT,
        )
        .await?;

        let mut state =
            read_created(&resource.id, || self.read_mq_broker(&resource.id, &broker_id)).await?;
        merge_declared_users(&mut state, &declared);
        Ok(state)
    }

    async fn update_mq_broker_settings(
        &self,
        broker_id: &str,
        changes: &Changes,
        attrs: &Attrs<'_>,
    ) -> ProviderResult<()> {
        log::debug!("Updating MQ Broker: {}", broker_id);
        let mut request = self.mq.update_broker().broker_id(broker_id);
        if changes.has("authentication_strategy") {
            request = request.set_authentication_strategy(
                attrs
                    .str("authentication_strategy")
                    .map(AuthenticationStrategy::from),
            );
        }
        if changes.has("auto_minor_version_upgrade") {
            request = request.auto_minor_version_upgrade(
                attrs.bool("auto_minor_version_upgrade").unwrap_or(false),
            );
        }
        if changes.has("configuration") {
            request = request.set_configuration(expand_configuration(attrs)?);
        }
        if changes.has("engine_version") {
            request = request.set_engine_version(attrs.string("engine_version"));
        }
        if changes.has("host_instance_type") {
            request = request.set_host_instance_type(attrs.string("host_instance_type"));
        }
        if changes.has("logs") {
            request = request.set_logs(expand_logs(attrs)?);
        }
        if changes.has("maintenance_window_start_time") {
            request = request.set_maintenance_window_start_time(expand_maintenance_window(attrs)?);
        }
        if changes.has("security_groups") {
            request = request.set_security_groups(Some(attrs.strings("security_groups")));
        }
        request
            .send()
            .await
            .map_err(|e| sdk_error(format!("updating MQ Broker ({})", broker_id), e))?;
        Ok(())
    }

    async fn apply_mq_user_changes(
        &self,
        broker_id: &str,
        changes: UserChanges,
    ) -> ProviderResult<()> {
        for user in changes.create {
            log::debug!("Creating MQ Broker ({}) user: {}", broker_id, user.username);
            user.to_user()?;
            self.mq
                .create_user()
                .broker_id(broker_id)
                .username(&user.username)
                .set_password(user.password.clone())
                .console_access(user.console_access)
                .set_groups(Some(user.groups.clone()))
                .replication_user(user.replication_user)
                .send()
                .await
                .map_err(|e| {
                    sdk_error(
                        format!("creating MQ Broker ({}) user ({})", broker_id, user.username),
                        e,
                    )
                })?;
        }
        for user in changes.update {
            log::debug!("Updating MQ Broker ({}) user: {}", broker_id, user.username);
            self.mq
                .update_user()
                .broker_id(broker_id)
                .username(&user.username)
                .set_password(user.password.clone())
                .console_access(user.console_access)
                .set_groups(Some(user.groups.clone()))
                .replication_user(user.replication_user)
                .send()
                .await
                .map_err(|e| {
                    sdk_error(
                        format!("updating MQ Broker ({}) user ({})", broker_id, user.username),
                        e,
                    )
                })?;
        }
        for username in changes.delete {
            log::debug!("Deleting MQ Broker ({}) user: {}", broker_id, username);
            let result = self
                .mq
                .delete_user()
                .broker_id(broker_id)
                .username(&username)
                .send()
                .await;
            deleted(
                result,
                format!("deleting MQ Broker ({}) user ({})", broker_id, username),
            )?;
        }
        Ok(())
    }

    pub(crate) async fn update_mq_broker(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: Resource,
    ) -> ProviderResult<State> {
        let plan = broker_update_plan(&from.attributes, &to.attributes)?;
        let attrs = Attrs::new(&to.attributes);

        if plan.update_settings {
            self.update_mq_broker_settings(identifier, &plan.changes, &attrs)
                .await?;
        }
        if plan.skipped_users {
            log::warn!(
                "MQ Broker ({}): RabbitMQ users cannot be changed after creation",
                identifier
            );
        }
        if !plan.users.is_empty() {
            self.apply_mq_user_changes(identifier, plan.users).await?;
        }

        let diff = self.tags.changes(&from.attributes, &to.attributes);
        if !diff.is_empty() {
            let name = attrs.str("broker_name").unwrap_or(identifier);
            let arn = self.mq_arn(from, &format!("broker:{}:{}", name, identifier));
            self.update_mq_tags(&arn, diff).await?;
        }

        if plan.needs_reboot {
            if plan.reboot_now {
                log::debug!("Rebooting MQ Broker: {}", identifier);
                self.mq
                    .reboot_broker()
                    .broker_id(identifier)
                    .send()
                    .await
                    .map_err(|e| sdk_error(format!("rebooting MQ Broker ({})", identifier), e))?;
                self.wait_mq_broker_running(identifier, &[STATE_REBOOT_IN_PROGRESS], REBOOT_TIMEOUT)
                    .await?;
            } else {
                log::info!(
                    "MQ Broker ({}) changes take effect at the next reboot or maintenance window",
                    identifier
                );
            }
        }

        let mut state = self.read_mq_broker(id, identifier).await?;
        merge_declared_users(&mut state, &user_specs(&attrs)?);
        Ok(state)
    }

    pub(crate) async fn delete_mq_broker(&self, identifier: &str) -> ProviderResult<()> {
        log::debug!("Deleting MQ Broker: {}", identifier);
        let result = self.mq.delete_broker().broker_id(identifier).send().await;
        deleted(result, format!("deleting MQ Broker ({})", identifier))?;

        StateChangeConf::new(
            &[
                STATE_CREATION_FAILED,
                STATE_DELETION_IN_PROGRESS,
                STATE_REBOOT_IN_PROGRESS,
                STATE_RUNNING,
            ],
            &[],
            DELETE_TIMEOUT,
        )
        .wait(|| self.mq_broker_status(identifier))
        .await?;
        Ok(())
    }

    /// Broker ID for a broker name, searching every page of ListBrokers
    async fn find_mq_broker_id_by_name(&self, name: &str) -> ProviderResult<Option<String>> {
        let mut next_token: Option<String> = None;
        loop {
            let output = self
                .mq
                .list_brokers()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| sdk_error("listing MQ Brokers", e))?;
            let matched = output
                .broker_summaries()
                .optional()
                .unwrap_or_default()
                .iter()
                .find(|b| string_of(b.broker_name()).as_deref() == Some(name))
                .and_then(|b| string_of(b.broker_id()));
            if matched.is_some() {
                return Ok(matched);
            }
            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => return Ok(None),
            }
        }
    }

    /// Data source: one broker by ID or by name
    pub(crate) async fn query_mq_broker(&self, query: &Resource) -> ProviderResult<State> {
        let attrs = Attrs::new(&query.attributes);
        let broker_id = match (attrs.str("broker_id"), attrs.str("broker_name")) {
            (Some(id), _) => id.to_string(),
            (None, Some(name)) => self
                .find_mq_broker_id_by_name(name)
                .await?
                .ok_or_else(|| ProviderError::empty_result(format!("MQ Broker named {}", name)))?,
            (None, None) => {
                return Err(ProviderError::validation(
                    "one of broker_id or broker_name is required",
                ));
            }
        };

        let output = self
            .find_mq_broker(&broker_id)
            .await?
            .ok_or_else(|| ProviderError::empty_result(format!("MQ Broker ({})", broker_id)))?;
        let mut attributes = flatten_broker(&output);
        self.put_mq_broker_users(&output, &mut attributes).await?;
        let tags = output.tags().map(KeyValueTags::from).unwrap_or_default();
        self.tags.apply(&mut attributes, tags);
        attributes.remove("tags_all");

        Ok(State::existing(query.id.clone(), attributes).with_identifier(broker_id))
    }
}
