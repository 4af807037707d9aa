//! Monitored-zone registry.
//!
//! The catalogue of Guadeloupe communes is reference data: coordinates,
//! priority tier, minimum refresh spacing, and a climatology profile
//! used by the synthetic fallback generator. Loaded once at startup.

use serde::{Deserialize, Serialize};

use crate::types::PriorityTier;

/// Broad terrain class; drives the default climatology profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerrainKind {
    Urban,
    Coastal,
    Mountain,
    Rural,
    Island,
}

/// Seasonal base values for one weather pattern.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClimatePattern {
    pub temp_c: f64,
    pub humidity_pct: u8,
    pub wind_kmh: f64,
    pub pressure_hpa: f64,
}

/// Climatology profile: base values for the three patterns the
/// generator alternates between.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Climatology {
    pub normal: ClimatePattern,
    pub rainy: ClimatePattern,
    pub dry: ClimatePattern,
}

impl Climatology {
    /// Default profile for a terrain class.
    pub fn for_terrain(kind: TerrainKind) -> Self {
        let p = |temp_c: f64, humidity_pct: u8, wind_kmh: f64, pressure_hpa: f64| ClimatePattern {
            temp_c,
            humidity_pct,
            wind_kmh,
            pressure_hpa,
        };
        match kind {
            TerrainKind::Urban => Self {
                normal: p(28.0, 75, 15.0, 1013.0),
                rainy: p(26.0, 85, 20.0, 1008.0),
                dry: p(30.0, 65, 12.0, 1015.0),
            },
            TerrainKind::Coastal => Self {
                normal: p(29.0, 78, 18.0, 1012.0),
                rainy: p(27.0, 88, 22.0, 1007.0),
                dry: p(31.0, 68, 15.0, 1016.0),
            },
            TerrainKind::Mountain => Self {
                normal: p(26.0, 80, 12.0, 1010.0),
                rainy: p(24.0, 90, 18.0, 1005.0),
                dry: p(28.0, 70, 10.0, 1014.0),
            },
            TerrainKind::Rural => Self {
                normal: p(28.0, 77, 16.0, 1012.0),
                rainy: p(26.0, 87, 21.0, 1007.0),
                dry: p(30.0, 67, 13.0, 1015.0),
            },
            TerrainKind::Island => Self {
                normal: p(29.0, 79, 19.0, 1012.0),
                rainy: p(27.0, 89, 23.0, 1006.0),
                dry: p(31.0, 69, 16.0, 1016.0),
            },
        }
    }
}

/// One monitored zone (commune).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    /// Stable slug identifier, e.g. "pointe-a-pitre".
    pub id: String,
    /// Display name.
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub terrain: TerrainKind,
    pub priority: PriorityTier,
    /// Minimum hours between two refreshes of this zone.
    pub min_refresh_hours: u32,
    pub climatology: Climatology,
}

/// The full registry of monitored zones.
#[derive(Debug, Clone)]
pub struct ZoneRegistry {
    zones: Vec<Zone>,
}

impl ZoneRegistry {
    pub fn new(zones: Vec<Zone>) -> Self {
        Self { zones }
    }

    pub fn get(&self, zone_id: &str) -> Option<&Zone> {
        self.zones.iter().find(|z| z.id == zone_id)
    }

    pub fn contains(&self, zone_id: &str) -> bool {
        self.get(zone_id).is_some()
    }

    pub fn all(&self) -> &[Zone] {
        &self.zones
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Zone IDs of a given tier, in registry order.
    pub fn ids_by_priority(&self, tier: PriorityTier) -> Vec<String> {
        self.zones
            .iter()
            .filter(|z| z.priority == tier)
            .map(|z| z.id.clone())
            .collect()
    }

    /// The built-in Guadeloupe catalogue: 32 communes, partitioned
    /// into 8 high / 8 medium / 16 low priority.
    pub fn guadeloupe() -> Self {
        use PriorityTier::{High, Low, Medium};
        use TerrainKind::{Coastal, Island, Mountain, Rural, Urban};

        let z = |id: &str,
                 name: &str,
                 lat: f64,
                 lon: f64,
                 terrain: TerrainKind,
                 priority: PriorityTier| Zone {
            id: id.into(),
            name: name.into(),
            lat,
            lon,
            terrain,
            priority,
            min_refresh_hours: match priority {
                High => 2,
                Medium => 4,
                Low => 6,
            },
            climatology: Climatology::for_terrain(terrain),
        };

        Self::new(vec![
            // Urban and tourist centres.
            z("pointe-a-pitre", "Pointe-à-Pitre", 16.2410, -61.5490, Urban, High),
            z("basse-terre", "Basse-Terre", 16.0000, -61.7333, Urban, High),
            z("les-abymes", "Les Abymes", 16.2667, -61.5167, Urban, High),
            z("baie-mahault", "Baie-Mahault", 16.2667, -61.5833, Urban, High),
            z("le-gosier", "Le Gosier", 16.1833, -61.5167, Coastal, High),
            z("sainte-anne", "Sainte-Anne", 16.2280, -61.3830, Coastal, High),
            z("saint-francois", "Saint-François", 16.2500, -61.2667, Coastal, High),
            z("le-moule", "Le Moule", 16.3333, -61.3500, Coastal, High),
            // Mid-size communes.
            z("petit-bourg", "Petit-Bourg", 16.1833, -61.6000, Rural, Medium),
            z("lamentin", "Lamentin", 16.2333, -61.6000, Urban, Medium),
            z("capesterre-belle-eau", "Capesterre-Belle-Eau", 16.0500, -61.5667, Mountain, Medium),
            z("bouillante", "Bouillante", 16.1333, -61.7667, Coastal, Medium),
            z("deshaies", "Deshaies", 16.3000, -61.7833, Coastal, Medium),
            z("saint-claude", "Saint-Claude", 16.0167, -61.6833, Mountain, Medium),
            z("goyave", "Goyave", 16.1167, -61.5500, Rural, Medium),
            z("trois-rivieres", "Trois-Rivières", 16.0333, -61.6500, Coastal, Medium),
            // Less visited communes and outlying islands.
            z("anse-bertrand", "Anse-Bertrand", 16.4667, -61.5000, Coastal, Low),
            z("port-louis", "Port-Louis", 16.4333, -61.5333, Coastal, Low),
            z("petit-canal", "Petit-Canal", 16.3500, -61.4500, Rural, Low),
            z("morne-a-l-eau", "Morne-à-l'Eau", 16.3333, -61.4167, Rural, Low),
            z("sainte-rose", "Sainte-Rose", 16.3333, -61.7000, Coastal, Low),
            z("pointe-noire", "Pointe-Noire", 16.2000, -61.7667, Coastal, Low),
            z("vieux-habitants", "Vieux-Habitants", 16.0667, -61.7667, Coastal, Low),
            z("baillif", "Baillif", 16.0167, -61.7333, Mountain, Low),
            z("gourbeyre", "Gourbeyre", 16.1167, -61.6667, Mountain, Low),
            z("vieux-fort", "Vieux-Fort", 15.9500, -61.7000, Coastal, Low),
            z("grand-bourg", "Grand-Bourg", 15.8833, -61.3167, Island, Low),
            z("capesterre-de-marie-galante", "Capesterre-de-Marie-Galante", 15.8833, -61.2167, Island, Low),
            z("saint-louis-marie-galante", "Saint-Louis", 15.9333, -61.3167, Island, Low),
            z("terre-de-bas", "Terre-de-Bas", 15.8667, -61.6500, Island, Low),
            z("terre-de-haut", "Terre-de-Haut", 15.8667, -61.6167, Island, Low),
            z("la-desirade", "La Désirade", 16.3167, -61.0833, Island, Low),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guadeloupe_catalogue_shape() {
        let registry = ZoneRegistry::guadeloupe();
        assert_eq!(registry.len(), 32);
        assert_eq!(registry.ids_by_priority(PriorityTier::High).len(), 8);
        assert_eq!(registry.ids_by_priority(PriorityTier::Medium).len(), 8);
        assert_eq!(registry.ids_by_priority(PriorityTier::Low).len(), 16);
    }

    #[test]
    fn test_lookup_by_slug() {
        let registry = ZoneRegistry::guadeloupe();
        let zone = registry.get("pointe-a-pitre").unwrap();
        assert_eq!(zone.name, "Pointe-à-Pitre");
        assert_eq!(zone.priority, PriorityTier::High);
        assert!(!registry.contains("atlantis"));
    }

    #[test]
    fn test_zone_ids_unique() {
        let registry = ZoneRegistry::guadeloupe();
        let mut ids: Vec<&str> = registry.all().iter().map(|z| z.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), registry.len(), "duplicate zone id in catalogue");
    }
}
