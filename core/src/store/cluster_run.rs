use super::SegStore;
use crate::{
    error::{SegError, SegResult},
    run::{ClientAssignment, RunHeader, RunRecord},
    summary::ClusterSummaryRow,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension};

/// Retained-record count of one run, for inspection listings.
#[derive(Debug, Clone, PartialEq)]
pub struct RunClientCount {
    pub profile: String,
    pub run_id:  String,
    pub rows:    i64,
}

/// Header columns as stored, before JSON and timestamp decoding.
struct RawHeader {
    run_id:     String,
    profile:    String,
    algorithm:  String,
    parameters: String,
    metrics:    String,
    run_at:     String,
}

impl RawHeader {
    fn decode(self) -> SegResult<RunHeader> {
        let run_at = DateTime::parse_from_rfc3339(&self.run_at)
            .map_err(|e| anyhow::anyhow!("run {}: bad run_at '{}': {e}", self.run_id, self.run_at))?
            .with_timezone(&Utc);
        Ok(RunHeader {
            parameters: serde_json::from_str(&self.parameters)?,
            metrics: serde_json::from_str(&self.metrics)?,
            run_id: self.run_id,
            profile: self.profile,
            algorithm: self.algorithm,
            run_at,
        })
    }
}

const HEADER_COLUMNS: &str = "run_id, profile, algorithm, parameters, metrics, run_at";

fn raw_header(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawHeader> {
    Ok(RawHeader {
        run_id:     row.get(0)?,
        profile:    row.get(1)?,
        algorithm:  row.get(2)?,
        parameters: row.get(3)?,
        metrics:    row.get(4)?,
        run_at:     row.get(5)?,
    })
}

impl SegStore {
    // ── Run persistence ───────────────────────────────────────────

    /// Write header, client rows and summary rows in ONE transaction.
    /// Any failure rolls the whole run back; a partial run is never visible.
    pub fn record_run(&self, run: &RunRecord) -> SegResult<()> {
        let header = &run.header;
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO cluster_run (run_id, profile, algorithm, parameters, metrics, run_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                &header.run_id,
                &header.profile,
                &header.algorithm,
                serde_json::to_string(&header.parameters)?,
                serde_json::to_string(&header.metrics)?,
                header.run_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO cluster_run_client (
                    run_id, client_id, profile, branch, portfolio, product_line,
                    cluster, risk_rating, risk_score, factors
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for c in &run.clients {
                stmt.execute(params![
                    &header.run_id,
                    &c.client_id,
                    &c.profile,
                    &c.branch,
                    &c.portfolio,
                    &c.product_line,
                    c.cluster as i64,
                    &c.risk_rating,
                    c.risk_score as i64,
                    serde_json::to_string(&c.factors)?,
                ])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO cluster_run_summary (
                    run_id, cluster, client_count, risk_score_mean, coverage_mean,
                    delinquency_mean, contract_value_mean, balance_mean
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for s in &run.summary {
                stmt.execute(params![
                    &header.run_id,
                    s.cluster as i64,
                    s.client_count as i64,
                    s.risk_score_mean,
                    s.coverage_mean,
                    s.delinquency_mean,
                    s.contract_value_mean,
                    s.balance_mean,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    // ── Run inspection ────────────────────────────────────────────

    /// Every run header, newest first.
    pub fn list_runs(&self) -> SegResult<Vec<RunHeader>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {HEADER_COLUMNS} FROM cluster_run ORDER BY run_at DESC, rowid DESC"
        ))?;
        let raw = stmt
            .query_map([], raw_header)?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter().map(RawHeader::decode).collect()
    }

    pub fn run_header(&self, run_id: &str) -> SegResult<RunHeader> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {HEADER_COLUMNS} FROM cluster_run WHERE run_id = ?1"),
                params![run_id],
                raw_header,
            )
            .optional()?;
        match raw {
            Some(raw) => raw.decode(),
            None => Err(SegError::UnknownRun { run_id: run_id.to_string() }),
        }
    }

    /// Client rows of a run, in the order they were written.
    pub fn run_clients(&self, run_id: &str) -> SegResult<Vec<ClientAssignment>> {
        let mut stmt = self.conn.prepare(
            "SELECT client_id, profile, branch, portfolio, product_line,
                    cluster, risk_rating, risk_score, factors
             FROM cluster_run_client WHERE run_id = ?1
             ORDER BY id ASC",
        )?;
        let raw = stmt
            .query_map(params![run_id], |row| {
                Ok((
                    ClientAssignment {
                        client_id:    row.get(0)?,
                        profile:      row.get(1)?,
                        branch:       row.get(2)?,
                        portfolio:    row.get(3)?,
                        product_line: row.get(4)?,
                        cluster:      row.get::<_, i64>(5)? as usize,
                        risk_rating:  row.get(6)?,
                        risk_score:   row.get::<_, i64>(7)? as u8,
                        factors:      Default::default(),
                    },
                    row.get::<_, String>(8)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(mut client, factors)| {
                client.factors = serde_json::from_str(&factors)?;
                Ok(client)
            })
            .collect()
    }

    /// Summary rows of a run, ascending by cluster.
    pub fn run_summary(&self, run_id: &str) -> SegResult<Vec<ClusterSummaryRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT cluster, client_count, risk_score_mean, coverage_mean,
                    delinquency_mean, contract_value_mean, balance_mean
             FROM cluster_run_summary WHERE run_id = ?1
             ORDER BY cluster ASC",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok(ClusterSummaryRow {
                cluster:             row.get::<_, i64>(0)? as usize,
                client_count:        row.get::<_, i64>(1)? as usize,
                risk_score_mean:     row.get(2)?,
                coverage_mean:       row.get(3)?,
                delinquency_mean:    row.get(4)?,
                contract_value_mean: row.get(5)?,
                balance_mean:        row.get(6)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Load a complete run back.
    pub fn load_run(&self, run_id: &str) -> SegResult<RunRecord> {
        Ok(RunRecord {
            header:  self.run_header(run_id)?,
            clients: self.run_clients(run_id)?,
            summary: self.run_summary(run_id)?,
        })
    }

    pub fn run_count(&self) -> SegResult<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM cluster_run", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn run_count_for_profile(&self, profile: &str) -> SegResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM cluster_run WHERE profile = ?1",
            params![profile],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Retained-record count per run, grouped by profile.
    pub fn client_count_per_run(&self) -> SegResult<Vec<RunClientCount>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.profile, r.run_id, COUNT(c.id)
             FROM cluster_run r
             LEFT JOIN cluster_run_client c ON c.run_id = r.run_id
             GROUP BY r.profile, r.run_id
             ORDER BY r.profile ASC, r.run_at ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(RunClientCount {
                profile: row.get(0)?,
                run_id:  row.get(1)?,
                rows:    row.get(2)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
