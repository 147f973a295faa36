//! SQLite persistence for daily spot price snapshots.

use crate::core::price::SpotPrice;
use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS spot_prices (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        report_date   DATE NOT NULL,
        period        INTEGER NOT NULL,
        time_from     DATETIME NOT NULL,
        time_to       DATETIME NOT NULL,
        price_eur     REAL NOT NULL,
        price_czk     REAL NOT NULL,
        eur_czk_rate  REAL NOT NULL,
        created_at    DATETIME DEFAULT CURRENT_TIMESTAMP,
        UNIQUE(report_date, period)
    );

    CREATE INDEX IF NOT EXISTS idx_report_date ON spot_prices(report_date);";

const HOUR_OF: &str = "CAST(strftime('%H', time_from) AS INTEGER)";

#[derive(Debug, Clone, PartialEq)]
pub struct DailyStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub count: usize,
    pub eur_czk_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverallStats {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HourlyAggregate {
    pub hour: u32,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeekdayAggregate {
    /// 0 = Monday, 6 = Sunday.
    pub weekday: u32,
    pub hour: u32,
    pub avg_price: f64,
    pub count: usize,
}

/// An hour of a day in which at least one interval cleared at or below zero.
#[derive(Debug, Clone, PartialEq)]
pub struct NegativePriceHour {
    pub date: NaiveDate,
    pub hour: u32,
    pub price_czk: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyAverage {
    pub date: NaiveDate,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
}

/// Store of daily spot price snapshots, one row per (report date, period).
#[derive(Debug)]
pub struct PriceStore {
    conn: Mutex<Connection>,
}

impl PriceStore {
    /// Opens (creating if needed) the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }

        debug!("Opening price database at {}", path.display());
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize database schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Price database lock poisoned"))
    }

    /// Upserts all `prices` of `report_date`. Returns the number of rows written.
    pub fn save_prices(
        &self,
        report_date: NaiveDate,
        prices: &[SpotPrice],
        eur_czk_rate: f64,
    ) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO spot_prices
                    (report_date, period, time_from, time_to, price_eur, price_czk, eur_czk_rate)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(report_date, period) DO UPDATE SET
                    time_from = excluded.time_from,
                    time_to = excluded.time_to,
                    price_eur = excluded.price_eur,
                    price_czk = excluded.price_czk,
                    eur_czk_rate = excluded.eur_czk_rate",
            )?;
            for price in prices {
                written += stmt.execute(params![
                    report_date,
                    price.period,
                    price.time_from,
                    price.time_to,
                    price.price_eur,
                    price.price_czk,
                    eur_czk_rate,
                ])?;
            }
        }
        tx.commit()
            .with_context(|| format!("Failed to save prices for {report_date}"))?;

        debug!("Saved {} rows for {}", written, report_date);
        Ok(written)
    }

    pub fn prices_for_date(&self, report_date: NaiveDate) -> Result<Vec<SpotPrice>> {
        self.prices_for_range(report_date, report_date)
    }

    /// Prices of all days in `start..=end`, ordered chronologically.
    pub fn prices_for_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<SpotPrice>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT period, time_from, time_to, price_eur, price_czk
             FROM spot_prices
             WHERE report_date >= ?1 AND report_date <= ?2
             ORDER BY report_date, period",
        )?;
        let prices = stmt
            .query_map(params![start, end], spot_price_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(prices)
    }

    /// Dates with stored prices, newest first.
    pub fn available_dates(&self) -> Result<Vec<NaiveDate>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT report_date FROM spot_prices ORDER BY report_date DESC")?;
        let dates = stmt
            .query_map([], |row| row.get::<_, NaiveDate>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(dates)
    }

    pub fn data_days_count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT report_date) FROM spot_prices",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn daily_stats(&self, report_date: NaiveDate) -> Result<Option<DailyStats>> {
        let conn = self.conn()?;
        let stats = conn
            .query_row(
                "SELECT MIN(price_czk), MAX(price_czk), AVG(price_czk), COUNT(*), MAX(eur_czk_rate)
                 FROM spot_prices
                 WHERE report_date = ?1
                 HAVING COUNT(*) > 0",
                params![report_date],
                |row| {
                    Ok(DailyStats {
                        min: row.get(0)?,
                        max: row.get(1)?,
                        avg: row.get(2)?,
                        count: row.get::<_, i64>(3)? as usize,
                        eur_czk_rate: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(stats)
    }

    /// Average, minimum and maximum over every interval since `since`.
    pub fn overall_stats(&self, since: NaiveDate) -> Result<Option<OverallStats>> {
        let conn = self.conn()?;
        let stats = conn
            .query_row(
                "SELECT AVG(price_czk), MIN(price_czk), MAX(price_czk), COUNT(*)
                 FROM spot_prices
                 WHERE report_date >= ?1
                 HAVING COUNT(*) > 0",
                params![since],
                |row| {
                    Ok(OverallStats {
                        avg: row.get(0)?,
                        min: row.get(1)?,
                        max: row.get(2)?,
                        count: row.get::<_, i64>(3)? as usize,
                    })
                },
            )
            .optional()?;
        Ok(stats)
    }

    /// Price statistics per hour of day over all days since `since`.
    pub fn hourly_aggregates(&self, since: NaiveDate) -> Result<Vec<HourlyAggregate>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {HOUR_OF} AS hour, AVG(price_czk), MIN(price_czk), MAX(price_czk), COUNT(*)
             FROM spot_prices
             WHERE report_date >= ?1
             GROUP BY hour
             ORDER BY hour"
        ))?;
        let aggregates = stmt
            .query_map(params![since], |row| {
                Ok(HourlyAggregate {
                    hour: row.get::<_, i64>(0)? as u32,
                    avg_price: row.get(1)?,
                    min_price: row.get(2)?,
                    max_price: row.get(3)?,
                    count: row.get::<_, i64>(4)? as usize,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(aggregates)
    }

    /// Average price per (weekday, hour) over all days since `since`.
    pub fn weekday_aggregates(&self, since: NaiveDate) -> Result<Vec<WeekdayAggregate>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT CAST(strftime('%w', time_from) AS INTEGER) AS weekday_sun,
                    {HOUR_OF} AS hour,
                    AVG(price_czk), COUNT(*)
             FROM spot_prices
             WHERE report_date >= ?1
             GROUP BY weekday_sun, hour"
        ))?;
        let mut aggregates = stmt
            .query_map(params![since], |row| {
                let weekday_sun = row.get::<_, i64>(0)? as u32;
                Ok(WeekdayAggregate {
                    // strftime counts from Sunday; shift so Monday is 0
                    weekday: (weekday_sun + 6) % 7,
                    hour: row.get::<_, i64>(1)? as u32,
                    avg_price: row.get(2)?,
                    count: row.get::<_, i64>(3)? as usize,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        aggregates.sort_by_key(|a| (a.weekday, a.hour));
        Ok(aggregates)
    }

    /// Hours with a non-positive price, newest day first.
    pub fn negative_price_hours(&self, since: NaiveDate) -> Result<Vec<NegativePriceHour>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT report_date, {HOUR_OF} AS hour, MIN(price_czk)
             FROM spot_prices
             WHERE report_date >= ?1 AND price_czk <= 0
             GROUP BY report_date, hour
             ORDER BY report_date DESC, hour"
        ))?;
        let hours = stmt
            .query_map(params![since], |row| {
                Ok(NegativePriceHour {
                    date: row.get(0)?,
                    hour: row.get::<_, i64>(1)? as u32,
                    price_czk: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(hours)
    }

    /// Per-day average, minimum and maximum, oldest day first.
    pub fn daily_averages(&self, since: NaiveDate) -> Result<Vec<DailyAverage>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT report_date, AVG(price_czk), MIN(price_czk), MAX(price_czk)
             FROM spot_prices
             WHERE report_date >= ?1
             GROUP BY report_date
             ORDER BY report_date",
        )?;
        let days = stmt
            .query_map(params![since], |row| {
                Ok(DailyAverage {
                    date: row.get(0)?,
                    avg_price: row.get(1)?,
                    min_price: row.get(2)?,
                    max_price: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(days)
    }
}

fn spot_price_from_row(row: &Row<'_>) -> rusqlite::Result<SpotPrice> {
    Ok(SpotPrice {
        period: row.get::<_, i64>(0)? as u32,
        time_from: row.get(1)?,
        time_to: row.get(2)?,
        price_eur: row.get(3)?,
        price_czk: row.get(4)?,
    })
}
