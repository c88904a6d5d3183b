/// Upstream relation defaults (imposm-style OSM POI import)
pub const DEFAULT_SOURCE_SCHEMA: &str = "mapdata_prod";
pub const DEFAULT_POINT_TABLE: &str = "osm_poi_point";
pub const DEFAULT_POLYGON_TABLE: &str = "osm_poi_polygon";
pub const DEFAULT_RELEVANCE_COLUMN: &str = "normalized_relevance";
pub const DEFAULT_FETCH_BATCH_SIZE: u32 = 500;

/// Target store default
pub const DEFAULT_TARGET_TABLE: &str = "app_placedata.places";

/// Region used to interpret phone numbers written without a country code
pub const DEFAULT_PHONE_REGION: &str = "US";

// Address tag keys
pub const TAG_ADDR_HOUSENUMBER: &str = "addr:housenumber";
pub const TAG_ADDR_STREET: &str = "addr:street";
pub const TAG_ADDR_UNIT: &str = "addr:unit";
pub const TAG_ADDR_CITY: &str = "addr:city";
pub const TAG_ADDR_STATE: &str = "addr:state";
pub const TAG_ADDR_COUNTRY: &str = "addr:country";
pub const TAG_ADDR_POSTCODE: &str = "addr:postcode";

/// Website tag keys, most preferred first
pub const WEBSITE_TAGS: [&str; 3] = ["contact:website", "website", "url"];

/// Phone tag keys, most preferred first
pub const PHONE_TAGS: [&str; 2] = ["contact:phone", "phone"];

// Environment overrides
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_SOURCE_SCHEMA: &str = "COMPOSITOR_SCHEMA";
pub const ENV_TARGET_TABLE: &str = "COMPOSITOR_TARGET_TABLE";
pub const ENV_PHONE_REGION: &str = "COMPOSITOR_PHONE_REGION";

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
