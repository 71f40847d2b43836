//! PostgreSQL store.
//!
//! Uses sqlx runtime queries against the schema in `migrations/`. Enums are
//! stored as lowercase text and parsed back on read.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use uuid::Uuid;

use super::{InviteRepository, KeyRepository, OrgRepository, Repository, RoleRepository};
use crate::models::{
    InviteState, Key, KeyType, Org, OrgInvite, OrgMembership, OrgRole, Page, PageParams,
    PlatformRole, RoleAssignment, StoredKey,
};
use crate::services::error::{ServiceError, ServiceResult};

#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn parse<T>(value: &str) -> ServiceResult<T>
where
    T: std::str::FromStr<Err = String>,
{
    value
        .parse()
        .map_err(|e: String| ServiceError::Internal(anyhow::anyhow!("Corrupt row: {}", e)))
}

/// OFFSET and LIMIT as Postgres BIGINTs. Offsets past `i64::MAX` are a
/// caller error, not a query failure.
fn page_bounds(page: &PageParams) -> ServiceResult<(i64, i64)> {
    let offset = i64::try_from(page.offset)
        .map_err(|_| ServiceError::invalid("Page offset out of range"))?;
    // limit() is clamped to MAX_LIMIT
    Ok((offset, page.limit() as i64))
}

/// Substring pattern for `ILIKE ... ESCAPE '\'` that matches `filter`
/// literally.
fn contains_pattern(filter: Option<&str>) -> Option<String> {
    filter.map(|f| {
        let mut pattern = String::with_capacity(f.len() + 2);
        pattern.push('%');
        for c in f.chars() {
            if matches!(c, '%' | '_' | '\\') {
                pattern.push('\\');
            }
            pattern.push(c);
        }
        pattern.push('%');
        pattern
    })
}

fn into_page<R, T>(rows: Vec<R>, total: i64, page: &PageParams) -> ServiceResult<Page<T>>
where
    R: TryInto<T, Error = ServiceError>,
{
    let items = rows
        .into_iter()
        .map(TryInto::try_into)
        .collect::<ServiceResult<Vec<T>>>()?;
    Ok(Page {
        total: total.max(0) as u64,
        offset: page.offset,
        limit: page.limit(),
        items,
    })
}

// ==================== Rows ====================

#[derive(Debug, FromRow)]
struct KeyRow {
    key_id: Uuid,
    key_type: String,
    issuer_id: String,
    subject: String,
    issued_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl TryFrom<KeyRow> for Key {
    type Error = ServiceError;

    fn try_from(row: KeyRow) -> ServiceResult<Self> {
        Ok(Key {
            id: row.key_id,
            key_type: parse::<KeyType>(&row.key_type)?,
            issuer_id: row.issuer_id,
            subject: row.subject,
            issued_at: row.issued_at,
            expires_at: row.expires_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct OrgRow {
    org_id: Uuid,
    owner_id: String,
    name: String,
    description: String,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrgRow> for Org {
    type Error = ServiceError;

    fn try_from(row: OrgRow) -> ServiceResult<Self> {
        Ok(Org {
            id: row.org_id,
            owner_id: row.owner_id,
            name: row.name,
            description: row.description,
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct MembershipRow {
    org_id: Uuid,
    member_id: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MembershipRow> for OrgMembership {
    type Error = ServiceError;

    fn try_from(row: MembershipRow) -> ServiceResult<Self> {
        Ok(OrgMembership {
            org_id: row.org_id,
            member_id: row.member_id,
            role: parse::<OrgRole>(&row.role)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct InviteRow {
    invite_id: Uuid,
    org_id: Uuid,
    org_name: String,
    invitee_id: Option<String>,
    invitee_email: String,
    invitee_role: String,
    inviter_id: String,
    inviter_email: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    state: String,
    platform_invite_id: Option<String>,
    activated_at: Option<DateTime<Utc>>,
    responded_at: Option<DateTime<Utc>>,
}

impl TryFrom<InviteRow> for OrgInvite {
    type Error = ServiceError;

    fn try_from(row: InviteRow) -> ServiceResult<Self> {
        Ok(OrgInvite {
            id: row.invite_id,
            org_id: row.org_id,
            org_name: row.org_name,
            invitee_id: row.invitee_id,
            invitee_email: row.invitee_email,
            invitee_role: parse::<OrgRole>(&row.invitee_role)?,
            inviter_id: row.inviter_id,
            inviter_email: row.inviter_email,
            created_at: row.created_at,
            expires_at: row.expires_at,
            state: parse::<InviteState>(&row.state)?,
            platform_invite_id: row.platform_invite_id,
            activated_at: row.activated_at,
            responded_at: row.responded_at,
        })
    }
}

const INVITE_COLUMNS: &str = "invite_id, org_id, org_name, invitee_id, invitee_email, \
    invitee_role, inviter_id, inviter_email, created_at, expires_at, state, \
    platform_invite_id, activated_at, responded_at";

// ==================== Keys ====================

#[async_trait]
impl KeyRepository for PgRepository {
    async fn save_key(&self, key: &StoredKey) -> ServiceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO api_keys (key_id, key_type, issuer_id, subject, secret_hash, issued_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(key.key.id)
        .bind(key.key.key_type.as_str())
        .bind(&key.key.issuer_id)
        .bind(&key.key.subject)
        .bind(&key.secret_hash)
        .bind(key.key.issued_at)
        .bind(key.key.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| ServiceError::from_db(e, "Key already exists"))?;
        Ok(())
    }

    async fn find_key_by_secret_hash(&self, secret_hash: &str) -> ServiceResult<Option<Key>> {
        let row = sqlx::query_as::<_, KeyRow>(
            "SELECT key_id, key_type, issuer_id, subject, issued_at, expires_at \
             FROM api_keys WHERE secret_hash = $1",
        )
        .bind(secret_hash)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Key::try_from).transpose()
    }

    async fn find_key(&self, issuer_id: &str, id: Uuid) -> ServiceResult<Option<Key>> {
        let row = sqlx::query_as::<_, KeyRow>(
            "SELECT key_id, key_type, issuer_id, subject, issued_at, expires_at \
             FROM api_keys WHERE key_id = $1 AND issuer_id = $2",
        )
        .bind(id)
        .bind(issuer_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Key::try_from).transpose()
    }

    async fn list_keys(&self, issuer_id: &str, page: &PageParams) -> ServiceResult<Page<Key>> {
        let (offset, limit) = page_bounds(page)?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM api_keys WHERE issuer_id = $1")
            .bind(issuer_id)
            .fetch_one(&self.pool)
            .await?;
        let rows = sqlx::query_as::<_, KeyRow>(
            r#"
            SELECT key_id, key_type, issuer_id, subject, issued_at, expires_at
            FROM api_keys
            WHERE issuer_id = $1
            ORDER BY issued_at, key_id
            OFFSET $2 LIMIT $3
            "#,
        )
        .bind(issuer_id)
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        into_page(rows, total, page)
    }

    async fn remove_key(&self, issuer_id: &str, id: Uuid) -> ServiceResult<bool> {
        let result = sqlx::query("DELETE FROM api_keys WHERE key_id = $1 AND issuer_id = $2")
            .bind(id)
            .bind(issuer_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ==================== Platform roles ====================

#[async_trait]
impl RoleRepository for PgRepository {
    async fn upsert_role(&self, assignment: &RoleAssignment) -> ServiceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO role_assignments (entity_id, role, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (entity_id) DO UPDATE SET role = EXCLUDED.role, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&assignment.entity_id)
        .bind(assignment.role.as_str())
        .bind(assignment.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_role(&self, entity_id: &str) -> ServiceResult<Option<PlatformRole>> {
        let role: Option<String> =
            sqlx::query_scalar("SELECT role FROM role_assignments WHERE entity_id = $1")
                .bind(entity_id)
                .fetch_optional(&self.pool)
                .await?;
        role.as_deref().map(parse::<PlatformRole>).transpose()
    }
}

// ==================== Orgs and memberships ====================

#[async_trait]
impl OrgRepository for PgRepository {
    async fn create_org_with_owner(&self, org: &Org, owner: &OrgMembership) -> ServiceResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orgs (org_id, owner_id, name, description, metadata, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(org.id)
        .bind(&org.owner_id)
        .bind(&org.name)
        .bind(&org.description)
        .bind(&org.metadata)
        .bind(org.created_at)
        .bind(org.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| ServiceError::from_db(e, "Org already exists"))?;

        sqlx::query(
            r#"
            INSERT INTO org_memberships (org_id, member_id, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(owner.org_id)
        .bind(&owner.member_id)
        .bind(owner.role.as_str())
        .bind(owner.created_at)
        .bind(owner.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| ServiceError::from_db(e, "Member already belongs to org"))?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_org(&self, id: Uuid) -> ServiceResult<Option<Org>> {
        let row = sqlx::query_as::<_, OrgRow>("SELECT * FROM orgs WHERE org_id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Org::try_from).transpose()
    }

    async fn update_org(&self, org: &Org) -> ServiceResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE orgs SET name = $2, description = $3, metadata = $4, updated_at = $5
            WHERE org_id = $1
            "#,
        )
        .bind(org.id)
        .bind(&org.name)
        .bind(&org.description)
        .bind(&org.metadata)
        .bind(org.updated_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::not_found("Org not found"));
        }
        Ok(())
    }

    async fn list_orgs(&self, page: &PageParams) -> ServiceResult<Page<Org>> {
        let (offset, limit) = page_bounds(page)?;
        let pattern = contains_pattern(page.name.as_deref());
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orgs WHERE ($1::text IS NULL OR name ILIKE $1 ESCAPE '\\')",
        )
        .bind(pattern.as_deref())
        .fetch_one(&self.pool)
        .await?;
        let rows = sqlx::query_as::<_, OrgRow>(
            r#"
            SELECT * FROM orgs
            WHERE ($1::text IS NULL OR name ILIKE $1 ESCAPE '\')
            ORDER BY created_at, org_id
            OFFSET $2 LIMIT $3
            "#,
        )
        .bind(pattern.as_deref())
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        into_page(rows, total, page)
    }

    async fn list_orgs_for_member(
        &self,
        member_id: &str,
        page: &PageParams,
    ) -> ServiceResult<Page<Org>> {
        let (offset, limit) = page_bounds(page)?;
        let pattern = contains_pattern(page.name.as_deref());
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM orgs o
            JOIN org_memberships m ON m.org_id = o.org_id
            WHERE m.member_id = $1 AND ($2::text IS NULL OR o.name ILIKE $2 ESCAPE '\')
            "#,
        )
        .bind(member_id)
        .bind(pattern.as_deref())
        .fetch_one(&self.pool)
        .await?;
        let rows = sqlx::query_as::<_, OrgRow>(
            r#"
            SELECT o.* FROM orgs o
            JOIN org_memberships m ON m.org_id = o.org_id
            WHERE m.member_id = $1 AND ($2::text IS NULL OR o.name ILIKE $2 ESCAPE '\')
            ORDER BY o.created_at, o.org_id
            OFFSET $3 LIMIT $4
            "#,
        )
        .bind(member_id)
        .bind(pattern.as_deref())
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        into_page(rows, total, page)
    }

    async fn remove_orgs(&self, ids: &[Uuid], owner_id: Option<&str>) -> ServiceResult<()> {
        let mut tx = self.pool.begin().await?;

        // Row locks on the orgs block concurrent membership inserts (their
        // foreign key check needs a share lock) until this commits.
        let locked: Vec<(Uuid, String)> = sqlx::query_as(
            "SELECT org_id, owner_id FROM orgs WHERE org_id = ANY($1) ORDER BY org_id FOR UPDATE",
        )
        .bind(ids)
        .fetch_all(&mut *tx)
        .await?;

        if let Some(missing) = ids.iter().find(|id| !locked.iter().any(|(o, _)| o == *id)) {
            return Err(ServiceError::not_found(format!("Org {} not found", missing)));
        }
        if let Some(owner_id) = owner_id {
            if let Some((id, _)) = locked.iter().find(|(_, owner)| owner != owner_id) {
                return Err(ServiceError::forbidden(format!(
                    "Only the owner may remove org {}",
                    id
                )));
            }
        }

        let busy: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT org_id FROM org_memberships
            WHERE org_id = ANY($1)
            GROUP BY org_id
            HAVING COUNT(*) > 1
            LIMIT 1
            "#,
        )
        .bind(ids)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(id) = busy {
            return Err(ServiceError::conflict(format!("Org {} still has members", id)));
        }

        // memberships and invites go with them via ON DELETE CASCADE
        sqlx::query("DELETE FROM orgs WHERE org_id = ANY($1)")
            .bind(ids)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_membership(
        &self,
        org_id: Uuid,
        member_id: &str,
    ) -> ServiceResult<Option<OrgMembership>> {
        let row = sqlx::query_as::<_, MembershipRow>(
            "SELECT * FROM org_memberships WHERE org_id = $1 AND member_id = $2",
        )
        .bind(org_id)
        .bind(member_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(OrgMembership::try_from).transpose()
    }

    async fn list_members(
        &self,
        org_id: Uuid,
        page: &PageParams,
    ) -> ServiceResult<Page<OrgMembership>> {
        let (offset, limit) = page_bounds(page)?;
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM org_memberships WHERE org_id = $1")
                .bind(org_id)
                .fetch_one(&self.pool)
                .await?;
        let rows = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT * FROM org_memberships
            WHERE org_id = $1
            ORDER BY created_at, member_id
            OFFSET $2 LIMIT $3
            "#,
        )
        .bind(org_id)
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        into_page(rows, total, page)
    }

    async fn save_membership(&self, membership: &OrgMembership) -> ServiceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO org_memberships (org_id, member_id, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(membership.org_id)
        .bind(&membership.member_id)
        .bind(membership.role.as_str())
        .bind(membership.created_at)
        .bind(membership.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| ServiceError::from_db(e, "Member already belongs to org"))?;
        Ok(())
    }

    async fn update_membership_role(
        &self,
        org_id: Uuid,
        member_id: &str,
        role: OrgRole,
        now: DateTime<Utc>,
    ) -> ServiceResult<bool> {
        let result = sqlx::query(
            "UPDATE org_memberships SET role = $3, updated_at = $4 WHERE org_id = $1 AND member_id = $2",
        )
        .bind(org_id)
        .bind(member_id)
        .bind(role.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| ServiceError::from_db(e, "Org already has an owner"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_membership(&self, org_id: Uuid, member_id: &str) -> ServiceResult<bool> {
        let result =
            sqlx::query("DELETE FROM org_memberships WHERE org_id = $1 AND member_id = $2")
                .bind(org_id)
                .bind(member_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn transfer_ownership(
        &self,
        org_id: Uuid,
        current_owner: &str,
        new_owner: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<()> {
        let mut tx = self.pool.begin().await?;

        // Demote first so the single-owner index holds at every statement.
        sqlx::query(
            "UPDATE org_memberships SET role = 'admin', updated_at = $3 WHERE org_id = $1 AND member_id = $2",
        )
        .bind(org_id)
        .bind(current_owner)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let promoted = sqlx::query(
            "UPDATE org_memberships SET role = 'owner', updated_at = $3 WHERE org_id = $1 AND member_id = $2",
        )
        .bind(org_id)
        .bind(new_owner)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        if promoted.rows_affected() == 0 {
            return Err(ServiceError::not_found("New owner is not a member of the org"));
        }

        let updated = sqlx::query("UPDATE orgs SET owner_id = $2, updated_at = $3 WHERE org_id = $1")
            .bind(org_id)
            .bind(new_owner)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(ServiceError::not_found("Org not found"));
        }

        tx.commit().await?;
        Ok(())
    }
}

// ==================== Invites ====================

#[async_trait]
impl InviteRepository for PgRepository {
    async fn save_invite(&self, invite: &OrgInvite) -> ServiceResult<()> {
        sqlx::query(&format!(
            "INSERT INTO org_invites ({INVITE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
        ))
        .bind(invite.id)
        .bind(invite.org_id)
        .bind(&invite.org_name)
        .bind(invite.invitee_id.as_deref())
        .bind(&invite.invitee_email)
        .bind(invite.invitee_role.as_str())
        .bind(&invite.inviter_id)
        .bind(&invite.inviter_email)
        .bind(invite.created_at)
        .bind(invite.expires_at)
        .bind(invite.state.as_str())
        .bind(invite.platform_invite_id.as_deref())
        .bind(invite.activated_at)
        .bind(invite.responded_at)
        .execute(&self.pool)
        .await
        .map_err(|e| ServiceError::from_db(e, "A pending invite already exists"))?;
        Ok(())
    }

    async fn find_invite(&self, id: Uuid) -> ServiceResult<Option<OrgInvite>> {
        let row = sqlx::query_as::<_, InviteRow>(&format!(
            "SELECT {INVITE_COLUMNS} FROM org_invites WHERE invite_id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(OrgInvite::try_from).transpose()
    }

    async fn find_invite_by_platform_invite(
        &self,
        platform_invite_id: &str,
    ) -> ServiceResult<Option<OrgInvite>> {
        let row = sqlx::query_as::<_, InviteRow>(&format!(
            "SELECT {INVITE_COLUMNS} FROM org_invites WHERE platform_invite_id = $1"
        ))
        .bind(platform_invite_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(OrgInvite::try_from).transpose()
    }

    async fn find_pending_invite(
        &self,
        org_id: Uuid,
        invitee_email: &str,
    ) -> ServiceResult<Option<OrgInvite>> {
        let row = sqlx::query_as::<_, InviteRow>(&format!(
            "SELECT {INVITE_COLUMNS} FROM org_invites \
             WHERE org_id = $1 AND LOWER(invitee_email) = LOWER($2) AND state = 'pending'"
        ))
        .bind(org_id)
        .bind(invitee_email)
        .fetch_optional(&self.pool)
        .await?;
        row.map(OrgInvite::try_from).transpose()
    }

    async fn activate_invite(
        &self,
        id: Uuid,
        invitee_id: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE org_invites SET invitee_id = $2, activated_at = $3
            WHERE invite_id = $1 AND state = 'pending' AND invitee_id IS NULL
            "#,
        )
        .bind(id)
        .bind(invitee_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn close_invite(
        &self,
        id: Uuid,
        state: InviteState,
        now: DateTime<Utc>,
    ) -> ServiceResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE org_invites SET state = $2, responded_at = $3
            WHERE invite_id = $1 AND state = 'pending'
            "#,
        )
        .bind(id)
        .bind(state.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn accept_invite(
        &self,
        id: Uuid,
        membership: &OrgMembership,
        now: DateTime<Utc>,
    ) -> ServiceResult<()> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE org_invites SET state = 'accepted', responded_at = $2, invitee_id = $3
            WHERE invite_id = $1 AND state = 'pending'
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(&membership.member_id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(ServiceError::conflict("Invite is no longer pending"));
        }

        sqlx::query(
            r#"
            INSERT INTO org_memberships (org_id, member_id, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(membership.org_id)
        .bind(&membership.member_id)
        .bind(membership.role.as_str())
        .bind(membership.created_at)
        .bind(membership.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| ServiceError::from_db(e, "Member already belongs to org"))?;

        tx.commit().await?;
        Ok(())
    }

    async fn list_invites_by_inviter(
        &self,
        inviter_id: &str,
        page: &PageParams,
    ) -> ServiceResult<Page<OrgInvite>> {
        let (offset, limit) = page_bounds(page)?;
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM org_invites WHERE inviter_id = $1")
                .bind(inviter_id)
                .fetch_one(&self.pool)
                .await?;
        let rows = sqlx::query_as::<_, InviteRow>(&format!(
            "SELECT {INVITE_COLUMNS} FROM org_invites WHERE inviter_id = $1 \
             ORDER BY created_at DESC, invite_id OFFSET $2 LIMIT $3"
        ))
        .bind(inviter_id)
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        into_page(rows, total, page)
    }

    async fn list_invites_for_invitee(
        &self,
        invitee_id: &str,
        email: &str,
        page: &PageParams,
    ) -> ServiceResult<Page<OrgInvite>> {
        let (offset, limit) = page_bounds(page)?;
        let filter = "invitee_id = $1 OR (invitee_id IS NULL AND LOWER(invitee_email) = LOWER($2))";
        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM org_invites WHERE {filter}"))
                .bind(invitee_id)
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        let rows = sqlx::query_as::<_, InviteRow>(&format!(
            "SELECT {INVITE_COLUMNS} FROM org_invites WHERE {filter} \
             ORDER BY created_at DESC, invite_id OFFSET $3 LIMIT $4"
        ))
        .bind(invitee_id)
        .bind(email)
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        into_page(rows, total, page)
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn health_check(&self) -> ServiceResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(|e| {
            tracing::error!("Database health check failed: {}", e);
            ServiceError::Database(e)
        })?;
        Ok(())
    }
}
