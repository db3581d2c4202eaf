//! Names of the fixed packet-processing pipeline objects.
//!
//! These strings must match the pipeline program loaded on the devices.
//! They are never derived at runtime.

pub const TABLE_L2_MY_STATION: &str = "FabricIngress.l2_my_station";
pub const TABLE_L2_EXACT: &str = "FabricIngress.l2_exact_table";
pub const TABLE_L2_TERNARY: &str = "FabricIngress.l2_ternary_table";
pub const TABLE_L3: &str = "FabricIngress.l3_table";

pub const FIELD_ETH_DST: &str = "hdr.ethernet.dst_addr";
pub const FIELD_IPV6_DST: &str = "hdr.ipv6.dst_addr";

pub const ACTION_NO_ACTION: &str = "NoAction";
pub const ACTION_SET_OUTPUT_PORT: &str = "FabricIngress.set_output_port";
pub const ACTION_SET_MULTICAST_GROUP: &str = "FabricIngress.set_multicast_group";
pub const ACTION_SET_L2_NEXT_HOP: &str = "FabricIngress.set_l2_next_hop";

pub const PARAM_PORT_NUM: &str = "port_num";
pub const PARAM_GID: &str = "gid";
pub const PARAM_DMAC: &str = "dmac";

/// Action profile backing `l3_table` select groups.
pub const ECMP_SELECTOR: &str = "FabricIngress.ecmp_selector";
