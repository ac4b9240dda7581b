//! Deployment profiles and the capacity table
//!
//! Capacity policy lives in exactly one place: [`CAPACITY_TABLE`]. Components
//! read their sizing from [`Profile::capacity`] and never branch on the
//! profile themselves.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Deployment-environment tag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    Staging,
    Production,
}

impl Profile {
    pub const ALL: [Profile; 2] = [Profile::Staging, Profile::Production];

    pub fn as_str(self) -> &'static str {
        match self {
            Profile::Staging => "staging",
            Profile::Production => "production",
        }
    }

    /// Capacity parameters for this profile
    pub fn capacity(self) -> &'static CapacityParams {
        &CAPACITY_TABLE[self as usize].1
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown profile '{0}' (expected 'staging' or 'production')")]
pub struct ProfileParseError(String);

impl FromStr for Profile {
    type Err = ProfileParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "staging" | "stg" => Ok(Profile::Staging),
            "production" | "prod" => Ok(Profile::Production),
            _ => Err(ProfileParseError(s.to_string())),
        }
    }
}

/// Cache node classes, ordered from smallest to largest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CacheNodeType {
    #[serde(rename = "cache.t4g.medium")]
    T4gMedium,
    #[serde(rename = "cache.m6g.large")]
    M6gLarge,
}

impl CacheNodeType {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheNodeType::T4gMedium => "cache.t4g.medium",
            CacheNodeType::M6gLarge => "cache.m6g.large",
        }
    }
}

impl std::fmt::Display for CacheNodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sizing of every capacity-bearing resource
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapacityParams {
    /// Number of cache nodes
    pub cache_nodes: u32,

    pub cache_node_type: CacheNodeType,

    /// Replicas the service starts with; also the scale-in floor
    pub service_desired_count: u32,

    /// CPU units per service task (1024 = one vCPU)
    pub service_cpu: u32,

    pub service_memory_mib: u32,

    /// Serverless database capacity bounds, in capacity units
    pub database_min_capacity: f64,
    pub database_max_capacity: f64,
}

/// Upper bound of service replicas, independent of profile
pub const MAX_SERVICE_REPLICAS: u32 = 6;

/// The capacity table, indexed by profile
pub static CAPACITY_TABLE: [(Profile, CapacityParams); 2] = [
    (
        Profile::Staging,
        CapacityParams {
            cache_nodes: 1,
            cache_node_type: CacheNodeType::T4gMedium,
            service_desired_count: 1,
            service_cpu: 512,
            service_memory_mib: 2048,
            database_min_capacity: 0.5,
            database_max_capacity: 8.0,
        },
    ),
    (
        Profile::Production,
        CapacityParams {
            cache_nodes: 3,
            cache_node_type: CacheNodeType::M6gLarge,
            service_desired_count: 3,
            service_cpu: 2048,
            service_memory_mib: 4096,
            database_min_capacity: 0.5,
            database_max_capacity: 32.0,
        },
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_indexed_by_profile() {
        for profile in Profile::ALL {
            assert_eq!(CAPACITY_TABLE[profile as usize].0, profile);
        }
    }

    #[test]
    fn test_production_never_smaller_than_staging() {
        let staging = Profile::Staging.capacity();
        let production = Profile::Production.capacity();

        assert!(production.cache_nodes >= staging.cache_nodes);
        assert!(production.cache_node_type >= staging.cache_node_type);
        assert!(production.service_desired_count >= staging.service_desired_count);
        assert!(production.service_cpu >= staging.service_cpu);
        assert!(production.service_memory_mib >= staging.service_memory_mib);
        assert!(production.database_min_capacity >= staging.database_min_capacity);
        assert!(production.database_max_capacity >= staging.database_max_capacity);
    }

    #[test]
    fn test_desired_counts_fit_under_ceiling() {
        for profile in Profile::ALL {
            let capacity = profile.capacity();
            assert!(capacity.service_desired_count >= 1);
            assert!(capacity.service_desired_count <= MAX_SERVICE_REPLICAS);
            assert!(capacity.database_min_capacity <= capacity.database_max_capacity);
        }
    }

    #[test]
    fn test_parse_profile() {
        assert_eq!("staging".parse::<Profile>().unwrap(), Profile::Staging);
        assert_eq!("Production".parse::<Profile>().unwrap(), Profile::Production);
        assert_eq!("prod".parse::<Profile>().unwrap(), Profile::Production);
        assert!("qa".parse::<Profile>().is_err());
        assert_eq!(Profile::default(), Profile::Staging);
    }
}
