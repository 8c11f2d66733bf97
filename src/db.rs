//! Registry of known vehicles.
//!
//! Every query binds its values as parameters; nothing read from an image or
//! typed by a user is ever spliced into SQL text.

use log::{ debug, info };
use rusqlite::{ Connection, OptionalExtension, Row, params };
use serde::{ Deserialize, Serialize };

use std::path::Path;

use crate::error::VrError;

const SAMPLE_VEHICLES: [(&str, &str, &str); 5] = [
    ("2012_2014_Ford Focus Ön", "34ABC123", "White"),
    ("2012_2014_Ford Focus Arka", "34ABC123", "White"),
    ("2016_2019_Honda Civic Ön", "06XYZ456", "Black"),
    ("2016_2019_Honda Civic Arka", "06XYZ456", "Black"),
    ("2012_2014_Ford Focus Ön", "35TEST99", "Red"),
];

pub trait VehicleRegistry {
    /// exact match on all three fields
    fn exists(&self, make_model: &str, plate: &str, color: &str) -> Result<bool, VrError>;

    fn insert_vehicle(&self, make_model: &str, plate: &str, color: &str) -> Result<i64, VrError>;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VehicleRecord {
    pub id: i64,
    pub make_model: String,
    pub plate: String,
    pub color: String,
    pub registered_at: String,
}

impl VehicleRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            make_model: row.get(1)?,
            plate: row.get(2)?,
            color: row.get(3)?,
            registered_at: row.get(4)?,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub total: i64,
    /// (color, count), most common first
    pub by_color: Vec<(String, i64)>,
    /// (make_model, count), most common first
    pub by_model: Vec<(String, i64)>,
}

pub struct SqliteRegistry {
    conn: Connection,
}

impl SqliteRegistry {

    pub fn open(path: impl AsRef<Path>) -> Result<Self, VrError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        info!("vehicle registry opened at {}", path.display());
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, VrError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, VrError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS registered_vehicles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                make_model TEXT NOT NULL,
                plate TEXT NOT NULL,
                color TEXT NOT NULL,
                registered_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(make_model, plate, color)
            );
            CREATE INDEX IF NOT EXISTS idx_plate ON registered_vehicles(plate);
            CREATE INDEX IF NOT EXISTS idx_make_model ON registered_vehicles(make_model);",
        )?;
        Ok(Self { conn })
    }

    pub fn get_vehicle(&self, make_model: &str, plate: &str, color: &str) -> Result<Option<VehicleRecord>, VrError> {
        let record = self.conn.query_row(
            "SELECT id, make_model, plate, color, registered_at FROM registered_vehicles
             WHERE make_model = ?1 AND plate = ?2 AND color = ?3",
            params![make_model, plate, color],
            VehicleRecord::from_row,
        ).optional()?;
        Ok(record)
    }

    /// Vehicles whose plate contains `fragment`, newest first
    pub fn search_by_plate(&self, fragment: &str) -> Result<Vec<VehicleRecord>, VrError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, make_model, plate, color, registered_at FROM registered_vehicles
             WHERE plate LIKE ?1 ORDER BY registered_at DESC, id DESC",
        )?;
        let pattern = format!("%{}%", fragment);
        let records = stmt.query_map(params![pattern], VehicleRecord::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn all_vehicles(&self) -> Result<Vec<VehicleRecord>, VrError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, make_model, plate, color, registered_at FROM registered_vehicles
             ORDER BY registered_at DESC, id DESC",
        )?;
        let records = stmt.query_map([], VehicleRecord::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// false when no row had that id
    pub fn delete_vehicle(&self, id: i64) -> Result<bool, VrError> {
        let deleted = self.conn.execute("DELETE FROM registered_vehicles WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    /// Inserts the demo vehicles, skipping any already present. Returns how
    /// many rows were added.
    pub fn add_sample_data(&self) -> Result<usize, VrError> {
        let mut added = 0;
        for (make_model, plate, color) in SAMPLE_VEHICLES.iter() {
            added += self.conn.execute(
                "INSERT OR IGNORE INTO registered_vehicles (make_model, plate, color) VALUES (?1, ?2, ?3)",
                params![make_model, plate, color],
            )?;
        }
        info!("{} sample vehicles added", added);
        Ok(added)
    }

    pub fn clear(&self) -> Result<usize, VrError> {
        Ok(self.conn.execute("DELETE FROM registered_vehicles", [])?)
    }

    pub fn statistics(&self) -> Result<RegistryStats, VrError> {
        let total = self.conn.query_row("SELECT COUNT(*) FROM registered_vehicles", [], |row| row.get(0))?;
        let by_color = self.group_count("color")?;
        let by_model = self.group_count("make_model")?;
        Ok(RegistryStats { total, by_color, by_model })
    }

    // `column` is one of our own column names, never user input
    fn group_count(&self, column: &'static str) -> Result<Vec<(String, i64)>, VrError> {
        let sql = format!(
            "SELECT {0}, COUNT(*) AS count FROM registered_vehicles GROUP BY {0} ORDER BY count DESC, {0}",
            column
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let counts = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(counts)
    }
}

impl VehicleRegistry for SqliteRegistry {

    fn exists(&self, make_model: &str, plate: &str, color: &str) -> Result<bool, VrError> {
        let found = self.get_vehicle(make_model, plate, color)?.is_some();
        debug!("registry lookup ({}, {}, {}) -> {}", make_model, plate, color, found);
        Ok(found)
    }

    /// A duplicate (make_model, plate, color) is a database error.
    fn insert_vehicle(&self, make_model: &str, plate: &str, color: &str) -> Result<i64, VrError> {
        self.conn.execute(
            "INSERT INTO registered_vehicles (make_model, plate, color) VALUES (?1, ?2, ?3)",
            params![make_model, plate, color],
        )?;
        Ok(self.conn.last_insert_rowid())
    }
}
