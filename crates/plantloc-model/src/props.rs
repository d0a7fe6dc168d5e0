// SPDX-License-Identifier: Apache-2.0
//! Category tags and host property names.
//!
//! The host tags every location shape with one or more category strings and
//! stores its structured data in named property rows. Both namespaces are
//! fixed; the constants here are the single source of truth for derivation
//! and write-back.

/// Category tag for process zone shapes.
pub const CAT_PROCESS_ZONE: &str = "ProcessZone";
/// Category tag for function group shapes.
pub const CAT_FUNCTION_GROUP: &str = "FunctionGroup";
/// Category tag for function unit shapes.
pub const CAT_FUNCTION_UNIT: &str = "FunctionUnit";
/// Category tag for equipment shapes.
pub const CAT_EQUIPMENT: &str = "Equipment";
/// Category tag for instrument shapes.
pub const CAT_INSTRUMENT: &str = "Instrument";
/// Category tag for function element shapes.
pub const CAT_FUNCTION_ELEMENT: &str = "FunctionElement";

/// Zone code.
pub const PROP_ZONE: &str = "Prop.Zone";
/// Zone display name.
pub const PROP_ZONE_NAME: &str = "Prop.ZoneName";
/// Zone English display name.
pub const PROP_ZONE_NAME_EN: &str = "Prop.ZoneEnglishName";
/// Group code.
pub const PROP_GROUP: &str = "Prop.Group";
/// Group display name.
pub const PROP_GROUP_NAME: &str = "Prop.GroupName";
/// Group English display name.
pub const PROP_GROUP_NAME_EN: &str = "Prop.GroupEnglishName";
/// Element tag code.
pub const PROP_ELEMENT: &str = "Prop.Element";
/// Free-text description.
pub const PROP_DESCRIPTION: &str = "Prop.Description";
/// Free-text remarks.
pub const PROP_REMARKS: &str = "Prop.Remarks";
/// Catalog function identifier.
pub const PROP_FUNCTION_ID: &str = "Prop.FunctionId";
/// Explicit unit quantity (function units; divisor for material multipliers).
pub const PROP_UNIT_QUANTITY: &str = "Prop.UnitQuantity";
/// Material quantity.
pub const PROP_QUANTITY: &str = "Prop.Quantity";
/// Material (catalog) code.
pub const PROP_MATERIAL_CODE: &str = "Prop.MaterialCode";
/// Material type classification.
pub const PROP_MATERIAL_TYPE: &str = "Prop.MaterialType";
/// Key engineering parameters.
pub const PROP_KEY_PARAMETERS: &str = "Prop.KeyParameters";
/// Project inclusion flag; absent means included.
pub const PROP_INCLUDE_IN_PROJECT: &str = "Prop.IncludeInProject";
