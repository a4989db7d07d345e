use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::ResolveError;
use crate::models::{
    AlertStatus, Employee, Financial, PartyRef, PersistedAlert, Protocol, ProtocolKind,
    ProtocolStatus, Role,
};
use crate::resolution::{AlertResolutionGateway, ResolveCommand};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

async fn upsert_employee(pool: &PgPool, id: &str, display_name: &str) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO protocol_alerts.employees (id, display_name)
        VALUES ($1, $2)
        ON CONFLICT (id) DO UPDATE SET display_name = EXCLUDED.display_name
        "#,
    )
    .bind(id)
    .bind(display_name)
    .execute(pool)
    .await?;
    Ok(())
}

/// SLA days as stored in the `INTEGER` column.
fn sla_column(protocol: &Protocol) -> anyhow::Result<Option<i32>> {
    protocol
        .sla_days
        .map(i32::try_from)
        .transpose()
        .with_context(|| format!("protocol {}: sla_days out of range", protocol.id))
}

async fn upsert_protocol(pool: &PgPool, protocol: &Protocol) -> anyhow::Result<u64> {
    let financial = protocol.financial;
    let sla_days = sla_column(protocol)?;
    let result = sqlx::query(
        r#"
        INSERT INTO protocol_alerts.protocols
        (id, kind, status, client_id, client_name, owner_id, last_movement_at, sla_days,
         estimated_value, received_value, recorded_loss)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (id) DO UPDATE
        SET kind = EXCLUDED.kind,
            status = EXCLUDED.status,
            client_id = EXCLUDED.client_id,
            client_name = EXCLUDED.client_name,
            owner_id = EXCLUDED.owner_id,
            last_movement_at = EXCLUDED.last_movement_at,
            sla_days = EXCLUDED.sla_days,
            estimated_value = EXCLUDED.estimated_value,
            received_value = EXCLUDED.received_value,
            recorded_loss = EXCLUDED.recorded_loss
        "#,
    )
    .bind(&protocol.id)
    .bind(protocol.kind.as_str())
    .bind(protocol.status.as_str())
    .bind(&protocol.client.id)
    .bind(&protocol.client.display_name)
    .bind(protocol.owner_id())
    .bind(protocol.last_movement_at)
    .bind(sla_days)
    .bind(financial.map(|f| f.estimated_value))
    .bind(financial.map(|f| f.received_value))
    .bind(financial.map(|f| f.recorded_loss))
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let employees = [
        ("emp-001", "Helena Rocha"),
        ("emp-002", "Caio Martins"),
        ("emp-003", "Renata Alves"),
    ];
    for (id, name) in employees {
        upsert_employee(pool, id, name).await?;
    }

    let now = Utc::now();
    let protocols = vec![
        seed_protocol(
            now,
            ("PRT-0001", ProtocolKind::Dpvat, 64, Some(30)),
            ("cli-101", "Marcos Teixeira"),
            Some(("emp-001", "Helena Rocha")),
            Some((22_000.0, 5_000.0, 0.0)),
        ),
        seed_protocol(
            now,
            ("PRT-0002", ProtocolKind::Labor, 38, Some(20)),
            ("cli-102", "Patricia Lopes"),
            None,
            None,
        ),
        seed_protocol(
            now,
            ("PRT-0003", ProtocolKind::LifeInsurance, 47, Some(60)),
            ("cli-103", "Eduardo Santos"),
            Some(("emp-001", "Helena Rocha")),
            Some((8_500.0, 0.0, 0.0)),
        ),
        seed_protocol(
            now,
            ("PRT-0004", ProtocolKind::SocialSecurity, 12, Some(10)),
            ("cli-104", "Aline Ferreira"),
            Some(("emp-002", "Caio Martins")),
            Some((3_200.0, 3_500.0, 0.0)),
        ),
        seed_protocol(
            now,
            ("PRT-0005", ProtocolKind::Civil, 5, None),
            ("cli-105", "Gustavo Ribeiro"),
            Some(("emp-003", "Renata Alves")),
            Some((14_000.0, 0.0, 2_300.0)),
        ),
    ];

    for protocol in &protocols {
        upsert_protocol(pool, protocol).await?;
    }

    let alerts = [
        (
            Uuid::parse_str("6f1c2b8e-4a7d-4f4e-9b1a-2d3c4e5f6a7b")?,
            "PRT-0001",
            "No movement for over 60 days",
        ),
        (
            Uuid::parse_str("9a8b7c6d-5e4f-4a3b-8c2d-1e0f9a8b7c6d")?,
            "PRT-0002",
            "Protocol has no owner",
        ),
    ];

    for (id, protocol_id, title) in alerts {
        sqlx::query(
            r#"
            INSERT INTO protocol_alerts.alerts (id, protocol_id, title)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(protocol_id)
        .bind(title)
        .execute(pool)
        .await?;
    }

    tracing::info!(
        employees = employees.len(),
        protocols = protocols.len(),
        alerts = alerts.len(),
        "seed data written"
    );
    Ok(())
}

fn seed_protocol(
    now: DateTime<Utc>,
    (id, kind, days_stalled, sla_days): (&str, ProtocolKind, i64, Option<u32>),
    client: (&str, &str),
    owner: Option<(&str, &str)>,
    financial: Option<(f64, f64, f64)>,
) -> Protocol {
    Protocol {
        id: id.to_string(),
        kind,
        status: ProtocolStatus::InProgress,
        client: PartyRef::new(client.0, client.1),
        owner: owner.map(|(id, name)| PartyRef::new(id, name)),
        last_movement_at: Some(now - Duration::days(days_stalled)),
        sla_days,
        financial: financial.map(|(estimated, received, loss)| Financial {
            estimated_value: estimated,
            received_value: received,
            recorded_loss: loss,
        }),
    }
}

fn protocol_from_row(row: &PgRow) -> anyhow::Result<Protocol> {
    let id: String = row.try_get("id")?;
    let kind: String = row.try_get("kind")?;
    let status: String = row.try_get("status")?;
    let owner_id: Option<String> = row.try_get("owner_id")?;
    let owner_name: Option<String> = row.try_get("owner_name")?;
    let sla_days: Option<i32> = row.try_get("sla_days")?;
    let estimated: Option<f64> = row.try_get("estimated_value")?;
    let received: Option<f64> = row.try_get("received_value")?;
    let loss: Option<f64> = row.try_get("recorded_loss")?;

    let financial = (estimated.is_some() || received.is_some() || loss.is_some()).then(|| {
        Financial {
            estimated_value: estimated.unwrap_or(0.0),
            received_value: received.unwrap_or(0.0),
            recorded_loss: loss.unwrap_or(0.0),
        }
    });

    Ok(Protocol {
        kind: kind
            .parse::<ProtocolKind>()
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("protocol {id}"))?,
        status: status
            .parse::<ProtocolStatus>()
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("protocol {id}"))?,
        client: PartyRef::new(
            row.try_get::<String, _>("client_id")?,
            row.try_get::<String, _>("client_name")?,
        ),
        owner: owner_id.map(|owner_id| {
            let name = owner_name.unwrap_or_else(|| owner_id.clone());
            PartyRef::new(owner_id, name)
        }),
        last_movement_at: row.try_get("last_movement_at")?,
        sla_days: sla_days.and_then(|days| u32::try_from(days).ok()),
        financial,
        id,
    })
}

pub async fn fetch_protocols(pool: &PgPool) -> anyhow::Result<Vec<Protocol>> {
    let rows = sqlx::query(
        "SELECT p.id, p.kind, p.status, p.client_id, p.client_name, p.owner_id, \
         e.display_name AS owner_name, p.last_movement_at, p.sla_days, \
         p.estimated_value, p.received_value, p.recorded_loss \
         FROM protocol_alerts.protocols p \
         LEFT JOIN protocol_alerts.employees e ON e.id = p.owner_id \
         ORDER BY p.id",
    )
    .fetch_all(pool)
    .await?;

    let protocols = rows
        .iter()
        .map(protocol_from_row)
        .collect::<anyhow::Result<Vec<_>>>()?;
    tracing::info!(count = protocols.len(), "protocols loaded");
    Ok(protocols)
}

pub async fn fetch_employees(pool: &PgPool) -> anyhow::Result<Vec<Employee>> {
    let rows = sqlx::query(
        "SELECT id, display_name FROM protocol_alerts.employees ORDER BY display_name",
    )
    .fetch_all(pool)
    .await?;

    let mut employees = Vec::new();
    for row in rows {
        employees.push(Employee {
            id: row.get("id"),
            display_name: row.get("display_name"),
        });
    }
    Ok(employees)
}

pub async fn fetch_pending_alerts(pool: &PgPool) -> anyhow::Result<Vec<PersistedAlert>> {
    let rows = sqlx::query(
        "SELECT id, protocol_id, title, created_at, resolved_by, resolved_at, note \
         FROM protocol_alerts.alerts \
         WHERE status = 'pending' \
         ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    let mut alerts = Vec::new();
    for row in rows {
        alerts.push(PersistedAlert {
            id: row.get("id"),
            protocol_id: row.get("protocol_id"),
            title: row.get("title"),
            status: AlertStatus::Pending,
            created_at: row.get("created_at"),
            resolved_by: row.get("resolved_by"),
            resolved_at: row.get("resolved_at"),
            note: row.get("note"),
        });
    }
    Ok(alerts)
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        id: String,
        kind: String,
        status: String,
        client_id: String,
        client_name: String,
        owner_id: Option<String>,
        owner_name: Option<String>,
        last_movement_at: Option<DateTime<Utc>>,
        sla_days: Option<u32>,
        estimated_value: Option<f64>,
        received_value: Option<f64>,
        recorded_loss: Option<f64>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut imported = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("invalid row {}", line + 2))?;

        let owner = match row.owner_id.filter(|id| !id.trim().is_empty()) {
            Some(owner_id) => {
                let name = row
                    .owner_name
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or_else(|| owner_id.clone());
                upsert_employee(pool, &owner_id, &name).await?;
                Some(PartyRef::new(owner_id, name))
            }
            None => None,
        };

        let has_financial = row.estimated_value.is_some()
            || row.received_value.is_some()
            || row.recorded_loss.is_some();

        let protocol = Protocol {
            kind: row
                .kind
                .parse::<ProtocolKind>()
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("protocol {}", row.id))?,
            status: row
                .status
                .parse::<ProtocolStatus>()
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("protocol {}", row.id))?,
            client: PartyRef::new(row.client_id, row.client_name),
            owner,
            last_movement_at: row.last_movement_at,
            sla_days: row.sla_days,
            financial: has_financial.then(|| Financial {
                estimated_value: row.estimated_value.unwrap_or(0.0),
                received_value: row.received_value.unwrap_or(0.0),
                recorded_loss: row.recorded_loss.unwrap_or(0.0),
            }),
            id: row.id,
        };

        if upsert_protocol(pool, &protocol).await? > 0 {
            imported += 1;
        }
    }

    tracing::info!(imported, path = %csv_path.display(), "csv import finished");
    Ok(imported)
}

/// Resolves persisted alerts in Postgres. The conditional update makes the
/// pending to resolved transition happen at most once per alert.
#[derive(Debug, Clone)]
pub struct PgAlertGateway {
    pool: PgPool,
}

impl PgAlertGateway {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl AlertResolutionGateway for PgAlertGateway {
    async fn resolve(&self, command: ResolveCommand, caller_role: Role) -> Result<(), ResolveError> {
        if !caller_role.can_resolve_alerts() {
            return Err(ResolveError::PermissionDenied(caller_role));
        }
        let id = Uuid::parse_str(&command.alert_id)
            .map_err(|_| ResolveError::NotFound(command.alert_id.clone()))?;

        let result = sqlx::query(
            r#"
            UPDATE protocol_alerts.alerts
            SET status = 'resolved', resolved_by = $2, resolved_at = now(), note = $3
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(&command.resolved_by)
        .bind(&command.note)
        .execute(&self.pool)
        .await
        .map_err(|e| ResolveError::Store(e.to_string()))?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        let exists = sqlx::query("SELECT 1 FROM protocol_alerts.alerts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ResolveError::Store(e.to_string()))?
            .is_some();

        if exists {
            Err(ResolveError::AlreadyResolved(command.alert_id))
        } else {
            Err(ResolveError::NotFound(command.alert_id))
        }
    }
}
