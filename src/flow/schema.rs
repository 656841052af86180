//! Canonical flow column schema
//!
//! The flow-extraction tool emits headerless CSV rows (the header line is
//! stripped during conversion), so column identity is positional. This is the
//! fixed, order-dependent schema those rows are parsed against.

/// Canonical column names, in file order.
pub const COLUMN_NAMES: &[&str] = &[
    // Identifying columns
    "Flow ID",
    "Source IP",
    "Source Port",
    "Destination IP",
    "Destination Port",
    "Protocol",
    "Timestamp",
    // Traffic-shape features
    "Flow Duration",
    "Total Fwd Packets",
    "Total Backward Packets",
    "Total Length of Fwd Packets",
    "Total Length of Bwd Packets",
    "Fwd Packet Length Max",
    "Fwd Packet Length Min",
    "Fwd Packet Length Mean",
    "Fwd Packet Length Std",
    "Bwd Packet Length Max",
    "Bwd Packet Length Min",
    "Bwd Packet Length Mean",
    "Bwd Packet Length Std",
    "Flow Bytes/s",
    "Flow Packets/s",
    "Flow IAT Mean",
    "Flow IAT Std",
    "Flow IAT Max",
    "Flow IAT Min",
    "Fwd IAT Total",
    "Fwd IAT Mean",
    "Fwd IAT Std",
    "Fwd IAT Max",
    "Fwd IAT Min",
    "Bwd IAT Total",
    "Bwd IAT Mean",
    "Bwd IAT Std",
    "Bwd IAT Max",
    "Bwd IAT Min",
    "Fwd PSH Flags",
    "Bwd PSH Flags",
    "Fwd URG Flags",
    "Bwd URG Flags",
    "Fwd Header Length",
    "Bwd Header Length",
    "Fwd Packets/s",
    "Bwd Packets/s",
    "Min Packet Length",
    "Max Packet Length",
    "Packet Length Mean",
    "Packet Length Std",
    "Packet Length Variance",
    "FIN Flag Count",
    "SYN Flag Count",
    "RST Flag Count",
    "PSH Flag Count",
    "ACK Flag Count",
    "URG Flag Count",
    "CWE Flag Count",
    "ECE Flag Count",
    "Down/Up Ratio",
    "Average Packet Size",
    "Avg Fwd Segment Size",
    "Avg Bwd Segment Size",
    "Fwd Avg Bytes/Bulk",
    "Fwd Avg Packets/Bulk",
    "Fwd Avg Bulk Rate",
    "Bwd Avg Bytes/Bulk",
    "Bwd Avg Packets/Bulk",
    "Bwd Avg Bulk Rate",
    "Subflow Fwd Packets",
    "Subflow Fwd Bytes",
    "Subflow Bwd Packets",
    "Subflow Bwd Bytes",
    "Init_Win_bytes_forward",
    "Init_Win_bytes_backward",
    "act_data_pkt_fwd",
    "min_seg_size_forward",
    "Active Mean",
    "Active Std",
    "Active Max",
    "Active Min",
    "Idle Mean",
    "Idle Std",
    "Idle Max",
    "Idle Min",
    "Label",
];

/// Number of canonical columns.
pub const NUM_COLUMNS: usize = 84;

/// Column index of the flow identifier.
pub const FLOW_ID: usize = 0;
/// Column index of the source IP address.
pub const SOURCE_IP: usize = 1;
/// Column index of the destination IP address.
pub const DESTINATION_IP: usize = 3;
/// Column index of the capture timestamp.
pub const TIMESTAMP: usize = 6;
/// Column index of the trailing label column.
pub const LABEL: usize = 83;

/// Columns that carry text rather than numeric values.
const TEXT_COLUMNS: [usize; 5] = [FLOW_ID, SOURCE_IP, DESTINATION_IP, TIMESTAMP, LABEL];

/// Whether the column at `index` holds text.
pub fn is_text_column(index: usize) -> bool {
    TEXT_COLUMNS.contains(&index)
}

/// Look up a column index by canonical name.
pub fn column_index(name: &str) -> Option<usize> {
    COLUMN_NAMES.iter().position(|&c| c == name)
}
