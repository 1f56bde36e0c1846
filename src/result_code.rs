// Copyright 2018-2025 Firefly Data Systems, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License. You may obtain a copy of
// the License at http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the
// License for the specific language governing permissions and limitations under
// the License.

use std::fmt;

/// Database operation error codes. The positive numbers align with the
/// server-side protocol definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize))]
pub enum ResultCode {
    /// OperationType was successful.
    Ok,

    /// Unknown server failure.
    ServerError,

    /// On retrieving, touching or replacing a record that doesn't exist.
    KeyNotFoundError,

    /// On modifying a record with unexpected generation.
    GenerationError,

    /// Bad parameter(s) were passed in database operation call.
    ParameterError,

    /// On create-only (write unique) operations on a record that already exists.
    KeyExistsError,

    /// On create-only (write unique) operations on a bin that already exists.
    BinExistsError,

    /// Expected cluster Id was not received.
    ClusterKeyMismatch,

    /// Server has run out of memory.
    ServerMemError,

    /// Client or server has timed out.
    Timeout,

    /// Operation not allowed in the current configuration.
    AlwaysForbidden,

    /// Partition is unavailable in the strong-consistency view.
    PartitionUnavailable,

    /// Operation is not supported with configured bin type.
    BinTypeError,

    /// Record size exceeds limit.
    RecordTooBig,

    /// Too many concurrent operations on the same record.
    KeyBusy,

    /// Scan aborted by server.
    ScanAbort,

    /// Unsupported Server Feature (e.g. Scan + UDF).
    UnsupportedFeature,

    /// Specified bin name does not exist in record.
    BinNotFound,

    /// Specified bin name does not exist in record.
    DeviceOverload,

    /// Key type mismatch.
    KeyMismatch,

    /// Invalid namespace.
    InvalidNamespace,

    /// Bin name length greater than 15 characters.
    BinNameTooLong,

    /// Operation not allowed at this time.
    FailForbidden,

    /// Element Not Found in CDT.
    ElementNotFound,

    /// Element Already Exists in CDT.
    ElementExists,

    /// Attempt to use an Enterprise feature on a Community server.
    EnterpriseOnly,

    /// The record's filter expression evaluated to false; the operation was
    /// not applied.
    FilteredOut,

    /// Write command loses conflict to an XDR write.
    LostConflict,

    /// There are no more records left for query.
    QueryEnd,

    /// Security functionality not supported by connected server.
    SecurityNotSupported,

    /// Security functionality not enabled by connected server.
    SecurityNotEnabled,

    /// Administrative command is invalid.
    InvalidCommand,

    /// Administrative field is invalid.
    InvalidField,

    /// Server is not accepting requests.
    IllegalState,

    /// A user-defined function returned an error.
    UdfBadResponse,

    /// The transaction the record is locked by is blocked.
    TxnBlocked,

    /// The record version on the server differs from the version read under
    /// the transaction.
    TxnVersionMismatch,

    /// The transaction deadline passed before the commit was applied.
    TxnExpired,

    /// The transaction was already committed.
    TxnAlreadyCommitted,

    /// The transaction was already aborted.
    TxnAlreadyAborted,

    /// Batch functionality has been disabled.
    BatchDisabled,

    /// Batch max. requests have been exceeded.
    BatchMaxRequestsExceeded,

    /// All batch queues are full.
    BatchQueuesFull,

    /// Secondary index already exists.
    IndexFound,

    /// Requested secondary index does not exist.
    IndexNotFound,

    /// Secondary index memory space exceeded.
    IndexOom,

    /// Secondary index not available.
    IndexNotReadable,

    /// Generic secondary index error.
    IndexGeneric,

    /// Index name maximum length exceeded.
    IndexNameMaxLen,

    /// Maximum number of indices exceeded.
    IndexMaxCount,

    /// Secondary index query aborted.
    QueryAborted,

    /// Secondary index queue full.
    QueryQueueFull,

    /// Secondary index query timed out on server.
    QueryTimeout,

    /// Generic query error.
    QueryGeneric,

    /// Unknown server result code.
    Unknown(u8),
}

impl ResultCode {
    /// Convert the result code from the server response.
    #[doc(hidden)]
    pub fn from_u8(n: u8) -> ResultCode {
        match n {
            0 => ResultCode::Ok,
            1 => ResultCode::ServerError,
            2 => ResultCode::KeyNotFoundError,
            3 => ResultCode::GenerationError,
            4 => ResultCode::ParameterError,
            5 => ResultCode::KeyExistsError,
            6 => ResultCode::BinExistsError,
            7 => ResultCode::ClusterKeyMismatch,
            8 => ResultCode::ServerMemError,
            9 => ResultCode::Timeout,
            10 => ResultCode::AlwaysForbidden,
            11 => ResultCode::PartitionUnavailable,
            12 => ResultCode::BinTypeError,
            13 => ResultCode::RecordTooBig,
            14 => ResultCode::KeyBusy,
            15 => ResultCode::ScanAbort,
            16 => ResultCode::UnsupportedFeature,
            17 => ResultCode::BinNotFound,
            18 => ResultCode::DeviceOverload,
            19 => ResultCode::KeyMismatch,
            20 => ResultCode::InvalidNamespace,
            21 => ResultCode::BinNameTooLong,
            22 => ResultCode::FailForbidden,
            23 => ResultCode::ElementNotFound,
            24 => ResultCode::ElementExists,
            25 => ResultCode::EnterpriseOnly,
            27 => ResultCode::FilteredOut,
            28 => ResultCode::LostConflict,
            50 => ResultCode::QueryEnd,
            51 => ResultCode::SecurityNotSupported,
            52 => ResultCode::SecurityNotEnabled,
            54 => ResultCode::InvalidCommand,
            55 => ResultCode::InvalidField,
            56 => ResultCode::IllegalState,
            100 => ResultCode::UdfBadResponse,
            120 => ResultCode::TxnBlocked,
            121 => ResultCode::TxnVersionMismatch,
            122 => ResultCode::TxnExpired,
            125 => ResultCode::TxnAlreadyCommitted,
            126 => ResultCode::TxnAlreadyAborted,
            150 => ResultCode::BatchDisabled,
            151 => ResultCode::BatchMaxRequestsExceeded,
            152 => ResultCode::BatchQueuesFull,
            200 => ResultCode::IndexFound,
            201 => ResultCode::IndexNotFound,
            202 => ResultCode::IndexOom,
            203 => ResultCode::IndexNotReadable,
            204 => ResultCode::IndexGeneric,
            205 => ResultCode::IndexNameMaxLen,
            206 => ResultCode::IndexMaxCount,
            210 => ResultCode::QueryAborted,
            211 => ResultCode::QueryQueueFull,
            212 => ResultCode::QueryTimeout,
            213 => ResultCode::QueryGeneric,
            code => ResultCode::Unknown(code),
        }
    }

    /// Convert a result code into an human readable error message.
    pub fn into_string(self) -> String {
        match self {
            ResultCode::Ok => String::from("ok"),
            ResultCode::ServerError => String::from("Server error"),
            ResultCode::KeyNotFoundError => String::from("Key not found"),
            ResultCode::GenerationError => String::from("Generation error"),
            ResultCode::ParameterError => String::from("Parameter error"),
            ResultCode::KeyExistsError => String::from("Key already exists"),
            ResultCode::BinExistsError => String::from("Bin already exists"),
            ResultCode::ClusterKeyMismatch => String::from("Cluster key mismatch"),
            ResultCode::ServerMemError => String::from("Server memory error"),
            ResultCode::Timeout => String::from("Timeout"),
            ResultCode::AlwaysForbidden => String::from("Operation not allowed"),
            ResultCode::PartitionUnavailable => String::from("Partition unavailable"),
            ResultCode::BinTypeError => String::from("Bin type error"),
            ResultCode::RecordTooBig => String::from("Record too big"),
            ResultCode::KeyBusy => String::from("Hot key"),
            ResultCode::ScanAbort => String::from("Scan aborted"),
            ResultCode::UnsupportedFeature => String::from("Unsupported server feature"),
            ResultCode::BinNotFound => String::from("Bin not found"),
            ResultCode::DeviceOverload => String::from("Device overload"),
            ResultCode::KeyMismatch => String::from("Key mismatch"),
            ResultCode::InvalidNamespace => String::from("Namespace not found"),
            ResultCode::BinNameTooLong => {
                String::from("Bin name length greater than 15 characters")
            }
            ResultCode::FailForbidden => String::from("Operation not allowed at this time"),
            ResultCode::ElementNotFound => String::from("Element not found"),
            ResultCode::ElementExists => String::from("Element already exists"),
            ResultCode::EnterpriseOnly => {
                String::from("Enterprise-only feature not supported by the community server")
            }
            ResultCode::FilteredOut => String::from("Record filtered out by expression"),
            ResultCode::LostConflict => String::from("Write lost conflict"),
            ResultCode::QueryEnd => String::from("Query end"),
            ResultCode::SecurityNotSupported => String::from("Security not supported"),
            ResultCode::SecurityNotEnabled => String::from("Security not enabled"),
            ResultCode::InvalidCommand => String::from("Invalid command"),
            ResultCode::InvalidField => String::from("Invalid field"),
            ResultCode::IllegalState => String::from("Illegal state"),
            ResultCode::UdfBadResponse => String::from("UDF returned error"),
            ResultCode::TxnBlocked => String::from("Record blocked by transaction lock"),
            ResultCode::TxnVersionMismatch => String::from("Transaction version mismatch"),
            ResultCode::TxnExpired => String::from("Transaction expired"),
            ResultCode::TxnAlreadyCommitted => String::from("Transaction already committed"),
            ResultCode::TxnAlreadyAborted => String::from("Transaction already aborted"),
            ResultCode::BatchDisabled => String::from("Batch functionality has been disabled"),
            ResultCode::BatchMaxRequestsExceeded => {
                String::from("Batch max. requests have been exceeded")
            }
            ResultCode::BatchQueuesFull => String::from("All batch queues are full"),
            ResultCode::IndexFound => String::from("Index already exists"),
            ResultCode::IndexNotFound => String::from("Index not found"),
            ResultCode::IndexOom => String::from("Index out of memory"),
            ResultCode::IndexNotReadable => String::from("Index not readable"),
            ResultCode::IndexGeneric => String::from("Index error"),
            ResultCode::IndexNameMaxLen => String::from("Index name max. length exceeded"),
            ResultCode::IndexMaxCount => String::from("Max. number of indexes exceeded"),
            ResultCode::QueryAborted => String::from("Query aborted"),
            ResultCode::QueryQueueFull => String::from("Query queue full"),
            ResultCode::QueryTimeout => String::from("Query timed out on server"),
            ResultCode::QueryGeneric => String::from("Query error"),
            ResultCode::Unknown(code) => format!("Unknown server error code: {}", code),
        }
    }
}

impl From<u8> for ResultCode {
    fn from(val: u8) -> ResultCode {
        ResultCode::from_u8(val)
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "{}", self.into_string())
    }
}

#[cfg(test)]
mod tests {
    use super::ResultCode;

    #[test]
    fn from_result_code() {
        assert_eq!(ResultCode::KeyNotFoundError, ResultCode::from(2u8));
        assert_eq!(ResultCode::FilteredOut, ResultCode::from(27u8));
        assert_eq!(ResultCode::TxnVersionMismatch, ResultCode::from(121u8));
        assert_eq!(ResultCode::Unknown(234), ResultCode::from(234u8));
    }

    #[test]
    fn into_string() {
        assert_eq!("ok".to_string(), ResultCode::from(0u8).into_string());
        assert_eq!(
            "Key not found".to_string(),
            ResultCode::from(2u8).into_string()
        );
    }
}
