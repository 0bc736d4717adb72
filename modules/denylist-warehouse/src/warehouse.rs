use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;

use denylist_common::{
    DistanceVsRssi, HotspotDetails, InventoryRow, RssiVsSnr, WitnessGraph, WitnessedMakers,
};

use crate::error::Result;

/// Witness samples farther apart than this are treated as location errors.
const MAX_WITNESS_DISTANCE_M: f64 = 100_000.0;

#[derive(sqlx::FromRow)]
struct InventoryRecord {
    address: String,
    name: Option<String>,
    location: Option<String>,
    owner: Option<String>,
    payer: Option<String>,
    maker: Option<String>,
    long_country: Option<String>,
    long_state: Option<String>,
    long_city: Option<String>,
    first_block: Option<i64>,
}

impl From<InventoryRecord> for InventoryRow {
    fn from(r: InventoryRecord) -> Self {
        InventoryRow {
            address: r.address,
            name: r.name,
            location: r.location,
            owner: r.owner,
            payer: r.payer,
            maker: r.maker,
            long_country: r.long_country,
            long_state: r.long_state,
            long_city: r.long_city,
            first_block: r.first_block,
        }
    }
}

#[derive(sqlx::FromRow)]
struct HotspotDetailsRecord {
    name: Option<String>,
    owner: Option<String>,
    first_block: Option<i64>,
    last_block: Option<i64>,
    reward_scale: Option<f64>,
    elevation: Option<i32>,
    gain: Option<i32>,
    nonce: Option<i64>,
    maker: Option<String>,
    country: Option<String>,
    state: Option<String>,
    city: Option<String>,
    location: Option<String>,
    as_of_block: Option<i64>,
}

impl From<HotspotDetailsRecord> for HotspotDetails {
    fn from(r: HotspotDetailsRecord) -> Self {
        HotspotDetails {
            name: r.name,
            owner: r.owner,
            first_block: r.first_block,
            last_block: r.last_block,
            reward_scale: r.reward_scale,
            elevation: r.elevation,
            gain: r.gain,
            nonce: r.nonce,
            maker: r.maker,
            country: r.country,
            state: r.state,
            city: r.city,
            location: r.location,
            as_of_block: r.as_of_block,
        }
    }
}

#[derive(sqlx::FromRow)]
struct WitnessEdgeRecord {
    transmitter_address: String,
    witness_address: String,
    hop: i32,
    maker: Option<String>,
    owner: Option<String>,
    location: Option<String>,
    first_block: Option<i64>,
}

#[derive(Clone)]
pub struct Warehouse {
    pool: PgPool,
}

impl Warehouse {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Full hotspot inventory with maker and geography resolved.
    pub async fn inventory(&self) -> Result<Vec<InventoryRow>> {
        let rows = sqlx::query_as::<_, InventoryRecord>(
            r#"
            SELECT
                g.address,
                g.name,
                g.location,
                g.owner,
                g.payer,
                m.name AS maker,
                l.long_country,
                l.long_state,
                l.long_city,
                g.first_block::BIGINT AS first_block
            FROM gateway_inventory g
            LEFT JOIN makers m ON m.address = g.payer
            LEFT JOIN locations l ON l.location = g.location
            ORDER BY g.first_block, g.address
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        debug!(rows = rows.len(), "Loaded inventory");
        Ok(rows.into_iter().map(InventoryRow::from).collect())
    }

    /// Highest block mined strictly before `timestamp`.
    pub async fn height_at(&self, timestamp: DateTime<Utc>) -> Result<Option<i64>> {
        let height = sqlx::query_scalar::<_, Option<i64>>(
            "SELECT MAX(height)::BIGINT FROM blocks WHERE timestamp < $1",
        )
        .bind(timestamp)
        .fetch_one(&self.pool)
        .await?;

        Ok(height)
    }

    /// Distance to each transmitter this hotspot witnessed, against the
    /// signal strength it reported for that receipt.
    pub async fn distance_vs_rssi(
        &self,
        address: &str,
        max_block: i64,
        window: i64,
    ) -> Result<DistanceVsRssi> {
        let rows = sqlx::query_as::<_, (f64, Option<i32>)>(
            r#"
            WITH hashes AS (
                SELECT transaction_hash, actor
                FROM transaction_actors
                WHERE actor = $1
                  AND actor_role = 'witness'
                  AND block > $2::BIGINT - $3::BIGINT
                  AND block <= $2::BIGINT
            ),
            receipts AS (
                SELECT fields, hash
                FROM transactions
                WHERE type IN ('poc_receipts_v1', 'poc_receipts_v2')
                  AND hash IN (SELECT transaction_hash FROM hashes)
            ),
            metadata AS (
                SELECT
                    h.actor AS witness,
                    r.fields->'path'->0->'witnesses' AS w,
                    r.fields->'path'->0->>'challengee_location' AS location_tx
                FROM hashes h
                LEFT JOIN receipts r ON r.hash = h.transaction_hash
            ),
            pairs AS (
                SELECT
                    location_tx,
                    (SELECT x.t->'signal' FROM jsonb_array_elements(w) AS x(t)
                     WHERE x.t->>'gateway' = witness)::int AS rssi,
                    (SELECT x.t->>'location' FROM jsonb_array_elements(w) AS x(t)
                     WHERE x.t->>'gateway' = witness) AS location_rx
                FROM metadata
            ),
            results AS (
                SELECT
                    ST_DistanceSphere(ST_Centroid(tx.geometry), ST_Centroid(rx.geometry))::float8
                        AS distance_m,
                    p.rssi
                FROM pairs p
                JOIN locations tx ON tx.location = p.location_tx
                JOIN locations rx ON rx.location = p.location_rx
            )
            SELECT distance_m, rssi FROM results
            WHERE distance_m < $4
            "#,
        )
        .bind(address)
        .bind(max_block)
        .bind(window)
        .bind(MAX_WITNESS_DISTANCE_M)
        .fetch_all(&self.pool)
        .await?;

        let (distance_m, rssi) = rows.into_iter().unzip();
        Ok(DistanceVsRssi { distance_m, rssi })
    }

    /// Makers of the distinct transmitters this hotspot witnessed.
    pub async fn witnessed_makers(
        &self,
        address: &str,
        max_block: i64,
        window: i64,
    ) -> Result<WitnessedMakers> {
        let rows = sqlx::query_as::<_, (Option<String>, i64)>(
            r#"
            WITH hashes AS (
                SELECT transaction_hash
                FROM transaction_actors
                WHERE actor = $1
                  AND actor_role = 'witness'
                  AND block > $2::BIGINT - $3::BIGINT
                  AND block <= $2::BIGINT
            ),
            transmitters AS (
                SELECT DISTINCT t.fields->'path'->0->>'challengee' AS transmitter
                FROM hashes h
                LEFT JOIN transactions t ON t.hash = h.transaction_hash
            )
            SELECT m.name AS maker, count(*)::BIGINT AS n_witnessed
            FROM transmitters tr
            JOIN gateway_inventory g ON g.address = tr.transmitter
            JOIN makers m ON m.address = g.payer
            GROUP BY m.name
            ORDER BY n_witnessed DESC, maker
            "#,
        )
        .bind(address)
        .bind(max_block)
        .bind(window)
        .fetch_all(&self.pool)
        .await?;

        let (maker, n_witnessed) = rows.into_iter().unzip();
        Ok(WitnessedMakers {
            maker,
            n_witnessed,
            as_of_block: max_block,
        })
    }

    /// Current metadata for one hotspot. `None` when the address has no
    /// inventory row with a known maker and location.
    pub async fn hotspot_details(&self, address: &str) -> Result<Option<HotspotDetails>> {
        let row = sqlx::query_as::<_, HotspotDetailsRecord>(
            r#"
            SELECT
                g.name,
                g.owner,
                g.first_block::BIGINT AS first_block,
                g.last_block::BIGINT AS last_block,
                g.reward_scale::float8 AS reward_scale,
                g.elevation::int4 AS elevation,
                g.gain::int4 AS gain,
                g.nonce::BIGINT AS nonce,
                m.name AS maker,
                l.long_country AS country,
                l.long_state AS state,
                l.long_city AS city,
                g.location,
                (SELECT MAX(height)::BIGINT FROM blocks) AS as_of_block
            FROM gateway_inventory g
            JOIN makers m ON m.address = g.payer
            JOIN locations l ON l.location = g.location
            WHERE g.address = $1
            "#,
        )
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(HotspotDetails::from))
    }

    /// Witnesses of this hotspot (hop 1) and witnesses of those (hop 2).
    pub async fn witness_graph(
        &self,
        address: &str,
        max_block: i64,
        window: i64,
    ) -> Result<WitnessGraph> {
        let rows = sqlx::query_as::<_, WitnessEdgeRecord>(
            r#"
            WITH first_hop AS (
                SELECT DISTINCT ON (witness_address)
                    transmitter_address, witness_address, 1 AS hop
                FROM challenge_receipts_parsed
                WHERE transmitter_address = $1
                  AND block > $2::BIGINT - $3::BIGINT
                  AND block <= $2::BIGINT
            ),
            second_hop AS (
                SELECT DISTINCT ON (witness_address)
                    transmitter_address, witness_address, 2 AS hop
                FROM challenge_receipts_parsed
                WHERE transmitter_address IN (SELECT witness_address FROM first_hop)
                  AND block > $2::BIGINT - $3::BIGINT
                  AND block <= $2::BIGINT
            ),
            combined AS (
                SELECT * FROM first_hop
                UNION
                SELECT * FROM second_hop
            )
            SELECT
                c.transmitter_address,
                c.witness_address,
                c.hop::int4 AS hop,
                m.name AS maker,
                g.owner,
                g.location,
                g.first_block::BIGINT AS first_block
            FROM combined c
            JOIN gateway_inventory g ON g.address = c.witness_address
            JOIN makers m ON m.address = g.payer
            ORDER BY c.hop, c.transmitter_address, c.witness_address
            "#,
        )
        .bind(address)
        .bind(max_block)
        .bind(window)
        .fetch_all(&self.pool)
        .await?;

        let mut graph = WitnessGraph::default();
        for r in rows {
            graph.transmitter_address.push(r.transmitter_address);
            graph.witness_address.push(r.witness_address);
            graph.hop.push(r.hop);
            graph.maker.push(r.maker);
            graph.owner.push(r.owner);
            graph.location.push(r.location);
            graph.first_block.push(r.first_block);
        }
        debug!(address, edges = graph.len(), "Loaded witness graph");
        Ok(graph)
    }

    /// Signal strength against signal-to-noise ratio for each witness receipt.
    pub async fn rssi_vs_snr(&self, address: &str, max_block: i64, window: i64) -> Result<RssiVsSnr> {
        let rows = sqlx::query_as::<_, (Option<i32>, Option<f64>)>(
            r#"
            WITH hashes AS (
                SELECT transaction_hash, actor
                FROM transaction_actors
                WHERE actor = $1
                  AND actor_role = 'witness'
                  AND block > $2::BIGINT - $3::BIGINT
                  AND block <= $2::BIGINT
            ),
            receipts AS (
                SELECT fields, hash
                FROM transactions
                WHERE type IN ('poc_receipts_v1', 'poc_receipts_v2')
                  AND hash IN (SELECT transaction_hash FROM hashes)
            ),
            metadata AS (
                SELECT h.actor AS witness, r.fields->'path'->0->'witnesses' AS w
                FROM hashes h
                LEFT JOIN receipts r ON r.hash = h.transaction_hash
            )
            SELECT
                (SELECT x.t->'signal' FROM jsonb_array_elements(w) AS x(t)
                 WHERE x.t->>'gateway' = witness)::int AS rssi,
                (SELECT x.t->'snr' FROM jsonb_array_elements(w) AS x(t)
                 WHERE x.t->>'gateway' = witness)::float8 AS snr
            FROM metadata
            "#,
        )
        .bind(address)
        .bind(max_block)
        .bind(window)
        .fetch_all(&self.pool)
        .await?;

        let (rssi, snr) = rows.into_iter().unzip();
        Ok(RssiVsSnr { rssi, snr })
    }
}
