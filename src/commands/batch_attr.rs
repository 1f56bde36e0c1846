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

use crate::batch::{BatchDeletePolicy, BatchReadPolicy, BatchUdfPolicy, BatchWritePolicy};
use crate::commands::buffer;
use crate::expressions::FilterExpression;
use crate::operations::{Operation, OperationBin, OperationType};
use crate::policy::{CommitLevel, GenerationPolicy, RecordExistsAction};

// Per-row header attributes of a batch record, derived from the row's
// variant and policy before encoding.
#[derive(Default)]
pub(crate) struct BatchAttr {
    pub filter_expression: Option<FilterExpression>,
    pub read_attr: u8,
    pub write_attr: u8,
    pub info_attr: u8,
    pub txn_attr: u8,
    pub expiration: u32,
    pub generation: u32,
    pub has_write: bool,
    pub send_key: bool,
}

impl BatchAttr {
    pub fn set_batch_read(&mut self, rp: &BatchReadPolicy) {
        self.filter_expression = rp.filter_expression.clone();
        self.read_attr = buffer::INFO1_READ;
        self.write_attr = 0;
        self.info_attr = 0;
        self.txn_attr = 0;
        self.expiration = 0;
        self.generation = 0;
        self.has_write = false;
        self.send_key = false;
    }

    pub fn adjust_read(&mut self, ops: &[Operation<'_>]) {
        for op in ops {
            if let OperationType::Read = op.op {
                match op.bin {
                    OperationBin::All => {
                        self.read_attr |= buffer::INFO1_GET_ALL;
                    }
                    OperationBin::None => {
                        self.read_attr |= buffer::INFO1_NOBINDATA;
                    }
                    OperationBin::Name(_) => (),
                }
            }
        }
    }

    pub fn adjust_read_for_all_bins(&mut self, read_all_bins: bool) {
        if read_all_bins {
            self.read_attr |= buffer::INFO1_GET_ALL;
        } else {
            self.read_attr |= buffer::INFO1_NOBINDATA;
        }
    }

    pub fn set_batch_write(&mut self, wp: &BatchWritePolicy) {
        self.filter_expression = wp.filter_expression.clone();
        self.read_attr = 0;
        self.write_attr = buffer::INFO2_WRITE | buffer::INFO2_RESPOND_ALL_OPS;
        self.info_attr = 0;
        self.txn_attr = 0;
        self.expiration = wp.expiration.into();
        self.has_write = true;
        self.send_key = wp.send_key;

        match wp.generation_policy {
            GenerationPolicy::None => {
                self.generation = 0;
            }

            GenerationPolicy::ExpectGenEqual => {
                self.generation = wp.generation;
                self.write_attr |= buffer::INFO2_GENERATION;
            }

            GenerationPolicy::ExpectGenGreater => {
                self.generation = wp.generation;
                self.write_attr |= buffer::INFO2_GENERATION_GT;
            }
        }

        match wp.record_exists_action {
            RecordExistsAction::Update => (),
            RecordExistsAction::UpdateOnly => self.info_attr |= buffer::INFO3_UPDATE_ONLY,
            RecordExistsAction::Replace => self.info_attr |= buffer::INFO3_CREATE_OR_REPLACE,
            RecordExistsAction::ReplaceOnly => self.info_attr |= buffer::INFO3_REPLACE_ONLY,
            RecordExistsAction::CreateOnly => self.write_attr |= buffer::INFO2_CREATE_ONLY,
        }

        if wp.durable_delete {
            self.write_attr |= buffer::INFO2_DURABLE_DELETE;
        }

        if wp.on_locking_only {
            self.txn_attr |= buffer::INFO4_TXN_ON_LOCKING_ONLY;
        }

        if wp.commit_level == CommitLevel::CommitMaster {
            self.info_attr |= buffer::INFO3_COMMIT_MASTER;
        }
    }

    pub fn adjust_write(&mut self, ops: &[Operation<'_>]) {
        let mut read_all_bins = false;
        let mut read_header = false;
        let mut has_read = false;

        for op in ops {
            match op.op {
                OperationType::CdtRead | OperationType::Read => {
                    // Read all bins if no bin is specified.
                    match op.bin {
                        OperationBin::All => {
                            read_all_bins = true;
                        }
                        OperationBin::None => {
                            read_header = true;
                        }
                        OperationBin::Name(_) => (),
                    }
                    has_read = true;
                }
                _ => (),
            }
        }

        if has_read {
            self.read_attr |= buffer::INFO1_READ;

            if read_all_bins {
                self.read_attr |= buffer::INFO1_GET_ALL;
            } else if read_header {
                self.read_attr |= buffer::INFO1_NOBINDATA;
            }
        }
    }

    pub fn set_batch_udf(&mut self, up: &BatchUdfPolicy) {
        self.filter_expression = up.filter_expression.clone();
        self.read_attr = 0;
        self.write_attr = buffer::INFO2_WRITE;
        self.info_attr = 0;
        self.txn_attr = 0;
        self.expiration = up.expiration.into();
        self.generation = 0;
        self.has_write = true;
        self.send_key = up.send_key;

        if up.durable_delete {
            self.write_attr |= buffer::INFO2_DURABLE_DELETE;
        }

        if up.commit_level == CommitLevel::CommitMaster {
            self.info_attr |= buffer::INFO3_COMMIT_MASTER;
        }
    }

    pub fn set_batch_delete(&mut self, dp: &BatchDeletePolicy) {
        self.filter_expression = dp.filter_expression.clone();
        self.read_attr = 0;
        self.write_attr =
            buffer::INFO2_WRITE | buffer::INFO2_RESPOND_ALL_OPS | buffer::INFO2_DELETE;
        self.info_attr = 0;
        self.txn_attr = 0;
        self.expiration = 0;
        self.has_write = true;
        self.send_key = dp.send_key;

        match dp.generation_policy {
            GenerationPolicy::None => {
                self.generation = 0;
            }
            GenerationPolicy::ExpectGenEqual => {
                self.generation = dp.generation;
                self.write_attr |= buffer::INFO2_GENERATION;
            }
            GenerationPolicy::ExpectGenGreater => {
                self.generation = dp.generation;
                self.write_attr |= buffer::INFO2_GENERATION_GT;
            }
        }

        if dp.durable_delete {
            self.write_attr |= buffer::INFO2_DURABLE_DELETE;
        }

        if dp.commit_level == CommitLevel::CommitMaster {
            self.info_attr |= buffer::INFO3_COMMIT_MASTER;
        }
    }
}
