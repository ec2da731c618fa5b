use crate::config::SharedConfig;
use crate::dns::correlation;
use crate::dns::origin::OriginResolver;
use crate::dns::records::CustomRecords;
use crate::error::Error;
use crate::interaction::{Interaction, OnResult};
use crate::stats::ServerStats;
use crate::storage::DynStorage;
use crate::txt_store::DynTxtStore;
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, error, warn};
use trust_dns_proto::op::Edns;
use trust_dns_proto::rr::rdata::{MX, SOA};
use trust_dns_server::authority::MessageResponseBuilder;
use trust_dns_server::client::op::{Header, MessageType, OpCode, ResponseCode};
use trust_dns_server::client::rr::rdata::TXT;
use trust_dns_server::client::rr::{LowerName, Name, RData, Record, RecordType};
use trust_dns_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};

/// Queries under this subtree are answered by the ACME DNS-01 provider and
/// never produce interactions or custom-record overrides.
pub const DNS_CHALLENGE_PREFIX: &str = "_acme-challenge.";

/// Responsible-mailbox constant for synthetic SOA records, shaped so CAs
/// probing the zone's authority accept it.
const SOA_MBOX: &str = "admin.letsencrypt.org.";

/// The single-writer cell the ACME client updates while a DNS-01 challenge
/// is active; plain `TXT` queries outside the challenge subtree serve its
/// current value. Readers snapshot, the writer swaps.
pub type TxtRecordCell = Arc<ArcSwap<String>>;

#[derive(Debug, Clone)]
struct ApexDomain {
    /// The domain as configured, also the storage key in root-TLD mode.
    name: String,
    /// Lowercased fqdn used for case-insensitive suffix tests.
    suffix: String,
}

#[derive(Default, Debug)]
struct ResponseSections {
    answers: Vec<Record>,
    authority: Vec<Record>,
    additionals: Vec<Record>,
}

/// The authoritative responder. All state is frozen at construction except
/// the ACME TXT cell and the stores behind their own synchronization;
/// `ServerFuture` invokes [`RequestHandler::handle_request`] from many
/// workers concurrently.
#[derive(Clone)]
pub struct Handler {
    config: SharedConfig,
    apexes: Vec<ApexDomain>,
    ns_domains: HashMap<LowerName, Vec<Name>>,
    mx_domains: HashMap<LowerName, Name>,
    primary_apex: LowerName,
    soa_mbox: Name,
    ip_address: Ipv4Addr,
    ipv6_address: Ipv6Addr,
    ttl: u32,
    custom_records: Arc<CustomRecords>,
    origin: Arc<OriginResolver>,
    acme_txt: TxtRecordCell,
    acme_store: DynTxtStore,
    storage: DynStorage,
    stats: Arc<ServerStats>,
    on_result: Option<OnResult>,
}

impl Handler {
    /// Build the responder: derive the per-apex `mail`/`ns1`/`ns2` name
    /// tables, load the custom record overlays and parse the trusted-source
    /// list. Fails only on an unusable apex list.
    pub fn new(
        config: SharedConfig,
        storage: DynStorage,
        acme_store: DynTxtStore,
        acme_txt: TxtRecordCell,
        stats: Arc<ServerStats>,
        on_result: Option<OnResult>,
    ) -> Result<Self, Error> {
        let fqdns = config.fqdn_domains()?;
        if fqdns.is_empty() {
            return Err(Error::NoDomains);
        }
        let mut ns_domains = HashMap::new();
        let mut mx_domains = HashMap::new();
        let mut apexes = Vec::with_capacity(fqdns.len());
        for (domain, fqdn) in config.domains.iter().zip(&fqdns) {
            let ns1 = Name::from_str("ns1")?.append_domain(fqdn)?;
            let ns2 = Name::from_str("ns2")?.append_domain(fqdn)?;
            let mail = Name::from_str("mail")?.append_domain(fqdn)?;

            let key = LowerName::from(fqdn.clone());
            ns_domains.insert(key.clone(), vec![ns1, ns2]);
            mx_domains.insert(key, mail);
            apexes.push(ApexDomain {
                name: domain.clone(),
                suffix: fqdn.to_string().to_lowercase(),
            });
        }
        let primary_apex = LowerName::from(fqdns[0].clone());

        Ok(Handler {
            custom_records: Arc::new(CustomRecords::from_config(&config)),
            origin: Arc::new(OriginResolver::from_config(&config)),
            ip_address: config.ip_address,
            ipv6_address: config.ipv6_address,
            ttl: config.dns_ttl,
            soa_mbox: Name::from_str(SOA_MBOX)?,
            config,
            apexes,
            ns_domains,
            mx_domains,
            primary_apex,
            acme_txt,
            acme_store,
            storage,
            stats,
            on_result,
        })
    }

    async fn dispatch_request<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
    ) -> Result<ResponseInfo, Error> {
        self.stats.incr_dns();

        if request.op_code() != OpCode::Query || request.message_type() != MessageType::Query {
            return self.handle_notimpl(request, response_handle).await;
        }

        let query = request.query();
        let qname = query.original().name().clone();
        let qtype = query.query_type();
        let is_challenge = query.name().to_string().starts_with(DNS_CHALLENGE_PREFIX);

        // An ACME store failure aborts the whole response; everything else
        // falls through to an empty authoritative reply.
        let sections = if is_challenge {
            debug!("got acme dns request for {qname} {qtype}");
            self.acme_sections(qtype, &qname).await?
        } else {
            self.static_sections(qtype, &qname)
        };

        if !is_challenge {
            let raw_request = render_request(request);
            let raw_response = render_response(request, &sections);
            self.record_interaction(
                qtype,
                &qname,
                &raw_request,
                &raw_response,
                request.src(),
                request.edns(),
            )
            .await;
        }

        let mut header = Header::response_from_request(request.header());
        header.set_authoritative(true);
        let builder = MessageResponseBuilder::from_message_request(request);
        let response = builder.build(
            header,
            sections.answers.iter(),
            sections.authority.iter(),
            &[],
            sections.additionals.iter(),
        );
        Ok(response_handle.send_response(response).await?)
    }

    async fn handle_notimpl<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
    ) -> Result<ResponseInfo, Error> {
        let response = MessageResponseBuilder::from_message_request(request);
        Ok(response_handle
            .send_response(response.error_msg(request.header(), ResponseCode::NotImp))
            .await?)
    }

    /// Non-challenge answers, dispatched by query type. Unsupported types
    /// produce an empty authoritative NOERROR reply.
    fn static_sections(&self, qtype: RecordType, qname: &Name) -> ResponseSections {
        match qtype {
            RecordType::A | RecordType::CNAME | RecordType::ANY => self.a_sections(qname),
            RecordType::AAAA => self.aaaa_sections(qname),
            RecordType::MX => self.mx_sections(qname),
            RecordType::NS => self.ns_sections(qname),
            RecordType::SOA => self.soa_sections(qname),
            RecordType::TXT => self.txt_sections(qname),
            _ => ResponseSections::default(),
        }
    }

    /// Challenge-subtree answers. TXT comes from the pluggable record
    /// store with the store's own TTL; SOA/NS/A/AAAA reuse the normal
    /// handlers so CAs probing the zone's authority succeed.
    async fn acme_sections(
        &self,
        qtype: RecordType,
        qname: &Name,
    ) -> Result<ResponseSections, Error> {
        match qtype {
            RecordType::TXT => self.acme_txt_sections(qname).await,
            RecordType::SOA => Ok(self.soa_sections(qname)),
            RecordType::NS => Ok(self.ns_sections(qname)),
            RecordType::A => Ok(self.a_sections(qname)),
            RecordType::AAAA => Ok(self.aaaa_sections(qname)),
            _ => Ok(ResponseSections::default()),
        }
    }

    async fn acme_txt_sections(&self, qname: &Name) -> Result<ResponseSections, Error> {
        let zone = qname.to_string().to_lowercase();
        let store = self.acme_store.read().await;
        let records = store.get_records(&zone).await?;

        let mut sections = ResponseSections::default();
        for record in records {
            sections.answers.push(Record::from_rdata(
                qname.clone(),
                record.ttl,
                RData::TXT(TXT::new(vec![record.value])),
            ));
        }
        Ok(sections)
    }

    fn a_sections(&self, qname: &Name) -> ResponseSections {
        let ip = self
            .custom_records
            .lookup_a(&qname.to_string())
            .unwrap_or(self.ip_address);
        let mut sections = ResponseSections::default();
        sections
            .answers
            .push(Record::from_rdata(qname.clone(), self.ttl, RData::A(ip)));
        self.attach_apex_ns(qname, &mut sections);
        sections
    }

    fn aaaa_sections(&self, qname: &Name) -> ResponseSections {
        let ip = self
            .custom_records
            .lookup_aaaa(&qname.to_string())
            .unwrap_or(self.ipv6_address);
        let mut sections = ResponseSections::default();
        sections
            .answers
            .push(Record::from_rdata(qname.clone(), self.ttl, RData::AAAA(ip)));
        self.attach_apex_ns(qname, &mut sections);
        sections
    }

    /// Authority NS for the matching apex plus v4 glue. Queries under no
    /// configured apex still get the primary apex's NS block; some CA
    /// probe flows depend on it.
    fn attach_apex_ns(&self, qname: &Name, sections: &mut ResponseSections) {
        for zone in [LowerName::from(qname.clone()), self.primary_apex.clone()] {
            if let Some(ns_names) = self.ns_domains.get(&zone) {
                for ns in ns_names {
                    sections.authority.push(Record::from_rdata(
                        qname.clone(),
                        self.ttl,
                        RData::NS(ns.clone()),
                    ));
                    sections.additionals.push(Record::from_rdata(
                        ns.clone(),
                        self.ttl,
                        RData::A(self.ip_address),
                    ));
                }
                return;
            }
        }
    }

    fn mx_sections(&self, qname: &Name) -> ResponseSections {
        let mut sections = ResponseSections::default();
        for zone in [LowerName::from(qname.clone()), self.primary_apex.clone()] {
            if let Some(mail) = self.mx_domains.get(&zone) {
                sections.answers.push(Record::from_rdata(
                    qname.clone(),
                    self.ttl,
                    RData::MX(MX::new(1, mail.clone())),
                ));
                return sections;
            }
        }
        sections
    }

    fn ns_sections(&self, qname: &Name) -> ResponseSections {
        let mut sections = ResponseSections::default();
        for zone in [LowerName::from(qname.clone()), self.primary_apex.clone()] {
            if let Some(ns_names) = self.ns_domains.get(&zone) {
                for ns in ns_names {
                    sections.answers.push(Record::from_rdata(
                        qname.clone(),
                        self.ttl,
                        RData::NS(ns.clone()),
                    ));
                }
                return sections;
            }
        }
        sections
    }

    fn soa_sections(&self, qname: &Name) -> ResponseSections {
        let mut sections = ResponseSections::default();
        for zone in [LowerName::from(qname.clone()), self.primary_apex.clone()] {
            if let Some(ns_names) = self.ns_domains.get(&zone) {
                let soa = SOA::new(ns_names[0].clone(), self.soa_mbox.clone(), 1, 0, 0, 60, 60);
                sections
                    .answers
                    .push(Record::from_rdata(qname.clone(), 0, RData::SOA(soa)));
                return sections;
            }
        }
        sections
    }

    fn txt_sections(&self, qname: &Name) -> ResponseSections {
        let value = self.acme_txt.load().as_str().to_string();
        let mut sections = ResponseSections::default();
        sections.answers.push(Record::from_rdata(
            qname.clone(),
            0,
            RData::TXT(TXT::new(vec![value])),
        ));
        sections
    }

    /// Compose and deliver the interaction for an answered message. Every
    /// failure here is logged and swallowed; the DNS reply always goes out.
    async fn record_interaction(
        &self,
        qtype: RecordType,
        qname: &Name,
        raw_request: &str,
        raw_response: &str,
        src: SocketAddr,
        edns: Option<&Edns>,
    ) {
        debug!("new DNS request: {raw_request}");

        let domain = qname.to_string();
        let domain_folded = domain.to_lowercase();
        let found_apex = self
            .apexes
            .iter()
            .find(|apex| domain_folded.ends_with(&apex.suffix));

        // Root-TLD mode stores any interaction with a configured apex under
        // the apex key, extractable correlation identifier or not. This is
        // the only branch that fires the live result callback.
        if self.config.root_tld {
            if let Some(apex) = found_apex {
                let host = self.origin.resolve(src, edns);
                let interaction = Interaction {
                    protocol: "dns".to_string(),
                    unique_id: domain.clone(),
                    full_id: domain.clone(),
                    q_type: qtype_text(qtype).to_string(),
                    raw_request: raw_request.to_string(),
                    raw_response: raw_response.to_string(),
                    remote_address: host.to_string(),
                    timestamp: OffsetDateTime::now_utc(),
                };

                if let Some(on_result) = &self.on_result {
                    on_result(&interaction);
                }

                match serde_json::to_vec(&interaction) {
                    Ok(data) => {
                        debug!("root TLD DNS interaction with {}", apex.name);
                        if let Err(err) =
                            self.storage.add_interaction_with_id(&apex.name, data).await
                        {
                            warn!("could not store dns interaction: {err}");
                        }
                    }
                    Err(err) => warn!("could not encode root tld dns interaction: {err}"),
                }
            }
        }

        if found_apex.is_none() {
            return;
        }
        let extracted = if self.config.scan_everywhere {
            correlation::extract_from_message(&self.config, raw_request)
        } else {
            correlation::extract_from_name(&self.config, &domain)
        };
        let Some(extraction) = extracted else {
            return;
        };

        let correlation_id = self.config.correlation_key(&extraction.unique_id).to_string();
        let host = self.origin.resolve(src, edns);
        let interaction = Interaction {
            protocol: "dns".to_string(),
            unique_id: extraction.unique_id,
            full_id: extraction.full_id,
            q_type: qtype_text(qtype).to_string(),
            raw_request: raw_request.to_string(),
            raw_response: raw_response.to_string(),
            remote_address: host.to_string(),
            timestamp: OffsetDateTime::now_utc(),
        };
        match serde_json::to_vec(&interaction) {
            Ok(data) => {
                debug!("DNS interaction with {correlation_id}");
                if let Err(err) = self.storage.add_interaction(&correlation_id, data).await {
                    warn!("could not store dns interaction: {err}");
                }
            }
            Err(err) => warn!("could not encode dns interaction: {err}"),
        }
    }
}

fn qtype_text(qtype: RecordType) -> &'static str {
    match qtype {
        RecordType::A => "A",
        RecordType::NS => "NS",
        RecordType::CNAME => "CNAME",
        RecordType::SOA => "SOA",
        RecordType::PTR => "PTR",
        RecordType::MX => "MX",
        RecordType::TXT => "TXT",
        RecordType::AAAA => "AAAA",
        _ => "",
    }
}

/// A presentation-format dump of the request, fed to the storage sink and
/// scanned for identifiers in scan-everywhere mode.
fn render_request(request: &Request) -> String {
    let query = request.query();
    format!(
        ";; opcode: {:?}, id: {}\n;; QUESTION SECTION:\n;{}\t{}\t{}\n",
        request.op_code(),
        request.header().id(),
        query.original().name(),
        query.query_class(),
        query.query_type(),
    )
}

fn render_response(request: &Request, sections: &ResponseSections) -> String {
    let mut out = format!(
        ";; opcode: {:?}, status: NOERROR, id: {}\n",
        request.op_code(),
        request.header().id(),
    );
    for (title, records) in [
        ("ANSWER", &sections.answers),
        ("AUTHORITY", &sections.authority),
        ("ADDITIONAL", &sections.additionals),
    ] {
        if records.is_empty() {
            continue;
        }
        let _ = writeln!(out, ";; {title} SECTION:");
        for record in records {
            let _ = writeln!(out, "{record}");
        }
    }
    out
}

#[async_trait::async_trait]
impl RequestHandler for Handler {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        response_handle: R,
    ) -> ResponseInfo {
        match self.dispatch_request(request, response_handle).await {
            Ok(info) => info,
            Err(err) => {
                error!("error in RequestHandler: {err:?}");
                let mut header = Header::new();
                header.set_response_code(ResponseCode::ServFail);
                header.into()
            }
        }
    }
}
