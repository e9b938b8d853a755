use super::SegStore;
use crate::{
    contract::{ContractRecord, RawValue},
    error::SegResult,
};
use rusqlite::{params, types::Value};

impl SegStore {
    // ── Contract source ───────────────────────────────────────────

    pub fn insert_contract(&self, c: &ContractRecord) -> SegResult<()> {
        self.conn.execute(
            "INSERT INTO contract (
                client_id, client_name, profile, branch, portfolio, product_line,
                risk_rating, coverage, delinquency, contract_value, balance, modality
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                &c.client_id,
                &c.client_name,
                &c.profile,
                &c.branch,
                &c.portfolio,
                &c.product_line,
                &c.risk_rating,
                raw_to_sql(&c.coverage),
                raw_to_sql(&c.delinquency),
                raw_to_sql(&c.contract_value),
                raw_to_sql(&c.balance),
                &c.modality,
            ],
        )?;
        Ok(())
    }

    /// Insert a batch of contracts in one transaction.
    pub fn insert_contracts(&self, contracts: &[ContractRecord]) -> SegResult<usize> {
        let tx = self.conn.unchecked_transaction()?;
        for c in contracts {
            self.insert_contract(c)?;
        }
        tx.commit()?;
        Ok(contracts.len())
    }

    /// Every contract with a profile tag, in insertion order.
    pub fn load_contracts(&self) -> SegResult<Vec<ContractRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT client_id, client_name, profile, branch, portfolio, product_line,
                    risk_rating, coverage, delinquency, contract_value, balance, modality
             FROM contract WHERE profile IS NOT NULL
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ContractRecord {
                client_id:      row.get(0)?,
                client_name:    row.get(1)?,
                profile:        row.get(2)?,
                branch:         row.get(3)?,
                portfolio:      row.get(4)?,
                product_line:   row.get(5)?,
                risk_rating:    row.get(6)?,
                coverage:       raw_from_sql(row.get(7)?),
                delinquency:    raw_from_sql(row.get(8)?),
                contract_value: raw_from_sql(row.get(9)?),
                balance:        raw_from_sql(row.get(10)?),
                modality:       row.get(11)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn contract_count(&self) -> SegResult<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM contract", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn raw_to_sql(field: &Option<RawValue>) -> Value {
    match field {
        None => Value::Null,
        Some(RawValue::Number(n)) => Value::Real(*n),
        Some(RawValue::Text(s)) => Value::Text(s.clone()),
    }
}

fn raw_from_sql(value: Value) -> Option<RawValue> {
    match value {
        Value::Null => None,
        Value::Integer(i) => Some(RawValue::Number(i as f64)),
        Value::Real(f) => Some(RawValue::Number(f)),
        Value::Text(s) => Some(RawValue::Text(s)),
        Value::Blob(b) => Some(RawValue::Text(String::from_utf8_lossy(&b).into_owned())),
    }
}
