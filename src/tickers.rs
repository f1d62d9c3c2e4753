use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::{AppError, Result};

/// Company name → listing symbol, as the names appear on the holdings page.
const DEFAULT_SYMBOLS: &[(&str, &str)] = &[
    ("Apple Inc", "AAPL"),
    ("Microsoft Corp", "MSFT"),
    ("NVIDIA Corp", "NVDA"),
    ("Amazon.com Inc", "AMZN"),
    ("Broadcom Inc", "AVGO"),
    ("Meta Platforms Inc Class A", "META"),
    ("Netflix Inc", "NFLX"),
    ("Costco Wholesale Corp", "COST"),
    ("Tesla Inc", "TSLA"),
    ("Alphabet Inc Class A", "GOOGL"),
    ("Alphabet Inc Class C", "GOOG"),
    ("T-Mobile US Inc", "TMUS"),
    ("Palantir Technologies Inc Ordinary Shares - Class A", "PLTR"),
    ("Cisco Systems Inc", "CSCO"),
    ("Linde PLC", "LIN"),
    ("PepsiCo Inc", "PEP"),
    ("Intuitive Surgical Inc", "ISRG"),
    ("Intuit Inc", "INTU"),
    ("Qualcomm Inc", "QCOM"),
    ("Booking Holdings Inc", "BKNG"),
    ("Adobe Inc", "ADBE"),
    ("Amgen Inc", "AMGN"),
    ("Advanced Micro Devices Inc", "AMD"),
    ("Texas Instruments Inc", "TXN"),
    ("Gilead Sciences Inc", "GILD"),
    ("Comcast Corp Class A", "CMCSA"),
    ("Honeywell International Inc", "HON"),
    ("Vertex Pharmaceuticals Inc", "VRTX"),
    ("Automatic Data Processing Inc", "ADP"),
    ("Applied Materials Inc", "AMAT"),
    ("Palo Alto Networks Inc", "PANW"),
    ("MercadoLibre Inc", "MELI"),
    ("Starbucks Corp", "SBUX"),
    ("Analog Devices Inc", "ADI"),
    ("CrowdStrike Holdings Inc Class A", "CRWD"),
    ("Intel Corp", "INTC"),
    ("KLA Corp", "KLAC"),
    ("Mondelez International Inc Class A", "MDLZ"),
    ("Lam Research Corp", "LRCX"),
    ("Cintas Corp", "CTAS"),
    ("Strategy Class A", "STGY"),
    ("Micron Technology Inc", "MU"),
    ("O'Reilly Automotive Inc", "ORLY"),
    ("AppLovin Corp Ordinary Shares - Class A", "APP"),
    ("Fortinet Inc", "FTNT"),
    ("Cadence Design Systems Inc", "CDNS"),
    ("DoorDash Inc Ordinary Shares - Class A", "DASH"),
    ("PDD Holdings Inc ADR", "PDD"),
    ("Constellation Energy Corp", "CEG"),
    ("Synopsys Inc", "SNPS"),
    ("Marriott International Inc Class A", "MAR"),
    ("Regeneron Pharmaceuticals Inc", "REGN"),
    ("PayPal Holdings Inc", "PYPL"),
    ("ASML Holding NV ADR", "ASML"),
    ("Roper Technologies Inc", "ROP"),
    ("Copart Inc", "CPRT"),
    ("Monster Beverage Corp", "MNST"),
    ("American Electric Power Co Inc", "AEP"),
    ("Autodesk Inc", "ADSK"),
    ("CSX Corp", "CSX"),
    ("Paychex Inc", "PAYX"),
    ("Airbnb Inc Ordinary Shares - Class A", "ABNB"),
    ("Workday Inc Class A", "WDAY"),
    ("Charter Communications Inc Class A", "CHTR"),
    ("Keurig Dr Pepper Inc", "KDP"),
    ("Exelon Corp", "EXC"),
    ("PACCAR Inc", "PCAR"),
    ("Marvell Technology Inc", "MRVL"),
    ("Fastenal Co", "FAST"),
    ("NXP Semiconductors NV", "NXPI"),
    ("Ross Stores Inc", "ROST"),
    ("Axon Enterprise Inc", "AXON"),
    ("Xcel Energy Inc", "XEL"),
    ("Coca-Cola Europacific Partners PLC", "CCEP"),
    ("Verisk Analytics Inc", "VRSK"),
    ("AstraZeneca PLC ADR", "AZN"),
    ("Diamondback Energy Inc", "FANG"),
    ("Take-Two Interactive Software Inc", "TTWO"),
    ("Electronic Arts Inc", "EA"),
    ("The Kraft Heinz Co", "KHC"),
    ("Baker Hughes Co Class A", "BKR"),
    ("Cognizant Technology Solutions Corp Class A", "CTSH"),
    ("IDEXX Laboratories Inc", "IDXX"),
    ("Atlassian Corp A", "TEAM"),
    ("CoStar Group Inc", "CSGP"),
    ("Old Dominion Freight Line Inc Ordinary Shares", "ODFL"),
    ("Lululemon Athletica Inc", "LULU"),
    ("Zscaler Inc", "ZS"),
    ("Datadog Inc Class A", "DDOG"),
    ("GE HealthCare Technologies Inc Common Stock", "GEHC"),
    ("Ansys Inc", "ANSS"),
    ("DexCom Inc", "DXCM"),
    ("The Trade Desk Inc Class A", "TTD"),
    ("Microchip Technology Inc", "MCHP"),
    ("CDW Corp", "CDW"),
    ("Warner Bros. Discovery Inc Ordinary Shares - Class A", "WBD"),
    ("GLOBALFOUNDRIES Inc", "GFS"),
    ("Biogen Inc", "BIIB"),
    ("ON Semiconductor Corp", "ON"),
    ("ARM Holdings PLC ADR", "ARM"),
    ("MongoDB Inc Class A", "MDB"),
];

/// Listing symbol → symbol it is reported under. Share classes of one issuer
/// collapse onto a single ticker here.
const DEFAULT_ALIASES: &[(&str, &str)] = &[("GOOGL", "GOOG")];

/// Override file layout for TICKER_MAP_PATH. Both tables are optional.
#[derive(Debug, Default, Deserialize)]
struct TickerMapFile {
    #[serde(default)]
    symbols: HashMap<String, String>,
    #[serde(default)]
    aliases: HashMap<String, String>,
}

/// Read-only company name → ticker lookup. Loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct TickerMap {
    symbols: HashMap<String, String>,
    aliases: HashMap<String, String>,
}

impl TickerMap {
    pub fn new(symbols: HashMap<String, String>, aliases: HashMap<String, String>) -> Self {
        Self { symbols, aliases }
    }

    /// The built-in constituent table.
    pub fn builtin() -> Self {
        Self::new(
            DEFAULT_SYMBOLS
                .iter()
                .map(|(name, sym)| (name.to_string(), sym.to_string()))
                .collect(),
            DEFAULT_ALIASES
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        )
    }

    /// Built-in table with the JSON file at `path` merged over it.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut map = Self::builtin();
        let Some(path) = path else {
            return Ok(map);
        };

        let raw = std::fs::read_to_string(Path::new(path))?;
        let file: TickerMapFile = serde_json::from_str(&raw)
            .map_err(|e| AppError::Config(format!("ticker map {path}: {e}")))?;
        let (n_symbols, n_aliases) = (file.symbols.len(), file.aliases.len());
        map.symbols.extend(file.symbols);
        map.aliases.extend(file.aliases);
        info!(
            path,
            symbols = n_symbols,
            aliases = n_aliases,
            "Merged ticker overrides ({} symbols total)",
            map.symbols.len()
        );
        Ok(map)
    }

    /// Listing symbol for `company_name` before aliasing, if mapped.
    pub fn listing(&self, company_name: &str) -> Option<&str> {
        self.symbols.get(company_name).map(String::as_str)
    }

    /// Ticker for `company_name`. Exact, case-sensitive match. Unmapped or
    /// empty names come back unchanged so a row is never dropped for lack of
    /// a symbol.
    pub fn resolve(&self, company_name: &str) -> String {
        match self.listing(company_name) {
            Some(listing) => self
                .aliases
                .get(listing)
                .cloned()
                .unwrap_or_else(|| listing.to_string()),
            None => company_name.to_string(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.symbols.len()
    }
}
