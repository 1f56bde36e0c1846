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

use std::iter::Peekable;
use std::str::Chars;

use crate::errors::{Error, Result};
use crate::Host;

pub struct Parser<'a> {
    s: Peekable<Chars<'a>>,
    default_port: u16,
}

impl<'a> Parser<'a> {
    pub fn new(s: &'a str, default_port: u16) -> Self {
        Parser {
            s: s.chars().peekable(),
            default_port,
        }
    }

    pub fn read_hosts(&mut self) -> Result<Vec<Host>> {
        let mut hosts = Vec::new();
        loop {
            let addr = self.read_addr_tuple()?;
            let (host, port) = match addr.len() {
                2 => (addr[0].clone(), addr[1].parse()?),
                1 => (addr[0].clone(), self.default_port),
                _ => {
                    return Err(Error::InvalidArgument(
                        "Invalid address string".to_string(),
                    ))
                }
            };
            hosts.push(Host::new(&host, port));

            match self.peek() {
                Some(&c) if c == ',' => self.next_char(),
                _ => break,
            };
        }

        Ok(hosts)
    }

    fn read_addr_tuple(&mut self) -> Result<Vec<String>> {
        let mut parts = Vec::new();
        loop {
            let part = self.read_addr_part()?;
            parts.push(part);
            match self.peek() {
                Some(&c) if c == ':' => self.next_char(),
                _ => break,
            };
        }
        Ok(parts)
    }

    fn read_addr_part(&mut self) -> Result<String> {
        let mut substr = String::new();
        loop {
            match self.peek() {
                Some(&c) if c != ':' && c != ',' => {
                    substr.push(c);
                    self.next_char();
                }
                _ => {
                    if substr.is_empty() {
                        return Err(Error::InvalidArgument(
                            "Invalid address string".to_string(),
                        ));
                    }
                    return Ok(substr);
                }
            }
        }
    }

    fn peek(&mut self) -> Option<&char> {
        self.s.peek()
    }

    fn next_char(&mut self) -> Option<char> {
        self.s.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_hosts() {
        assert_eq!(
            vec![Host::new("a", 3000)],
            Parser::new("a", 3000).read_hosts().unwrap()
        );
        assert_eq!(
            vec![Host::new("a", 5000), Host::new("b", 3000)],
            Parser::new("a:5000,b", 3000).read_hosts().unwrap()
        );
        assert!(Parser::new("", 3000).read_hosts().is_err());
        assert!(Parser::new("a:b:c:d", 3000).read_hosts().is_err());
    }
}
