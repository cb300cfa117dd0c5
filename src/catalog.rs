/// A selectable option: the stored value and the label the form shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub value: &'static str,
    pub label: &'static str,
}

const fn entry(value: &'static str, label: &'static str) -> CatalogEntry {
    CatalogEntry { value, label }
}

pub static MODEL_TYPES: &[CatalogEntry] = &[
    entry("ChromeBook", "ChromeBook"),
    entry("CaixaDeSom", "Caixa de Som"),
    entry("Desktop", "Desktop"),
    entry("Estabilizador", "Estabilizador"),
    entry("HubSwitch", "HubSwitch"),
    entry("Impressora", "Impressora"),
    entry("ModemWiFi", "Modem Wi-Fi"),
    entry("Monitor", "Monitor"),
    entry("Netbook", "Netbook"),
    entry("NoBreak", "NoBreak"),
    entry("Notebook", "Notebook"),
    entry("Projetor", "Projetor ou Data Show"),
    entry("Relogio", "Relógio Ponto"),
    entry("Tela", "Tela Interativa"),
    entry("Telefone", "Telefone Fixo"),
    entry("Tablet", "Tablet"),
    entry("Tv", "TV ou SmartTv"),
    entry("Outro", "Outro equipamento"),
];

pub static RAM_SPECS: &[CatalogEntry] = &[
    entry("NotFound", "Não se Aplica"),
    entry("2GBDDR2", "2GB RAM DDR2"),
    entry("3GBDDR2", "3GB RAM DDR2"),
    entry("2GBDDR3", "2GB RAM DDR3"),
    entry("3GBDDR3", "3GB RAM DDR3"),
    entry("4GBDDR3", "4GB RAM DDR3"),
    entry("6GBDDR3", "6GB RAM DDR3"),
    entry("8GBDDR3", "8GB RAM DDR3"),
    entry("2GBDDR4", "2GB RAM DDR4"),
    entry("3GBDDR4", "3GB RAM DDR4"),
    entry("4GBDDR4", "4GB RAM DDR4"),
    entry("6GBDDR4", "6GB RAM DDR4"),
    entry("8GBDDR4", "8GB RAM DDR4"),
    entry("4GBDDR5", "4GB RAM DDR5"),
    entry("8GBDDR5", "8GB RAM DDR5"),
];

/// Locations are stored by display name; the key is what the form submits.
pub static LOCATIONS: &[CatalogEntry] = &[
    entry("escola_magi", "E.M.E.F. Luiz de Oliveira"),
    entry("escola_magi_dois", "E.M.E.I. Estrelinha do Mar"),
    entry("escola_pinhal", "E.M.E.F. Calil Miguel Alem"),
    entry("escola_pinhal_dois", "E.M.E.I. Peixinho Dourado"),
    entry("escola_pinhal_tres", "E.M.E.F. José Antônio"),
    entry("escola_pinhal_quatro", "E.M.E.I. Golfinho do Mar"),
    entry("escola_pinhal_cinco", "E.M.E.F. Antônio Francisco Nunes"),
    entry("escola_tunel", "E.M.E.F. Barão de Santo Ângelo"),
    entry("escola_tunel_dois", "E.M.E.I. Abelhinhas"),
    entry("secretaria", "Secretaria Municipal de Educação e Cultura"),
    entry("uab", "Universidade Aberta Brasileira"),
];

pub fn find_value<'a>(catalog: &'a [CatalogEntry], value: &str) -> Option<&'a CatalogEntry> {
    catalog.iter().find(|e| e.value == value)
}

/// Resolve a submitted location (key or display name) to its display name.
pub fn resolve_location(submitted: &str) -> Option<&'static str> {
    LOCATIONS
        .iter()
        .find(|e| e.value == submitted || e.label == submitted)
        .map(|e| e.label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalog_values_are_unique() {
        for catalog in [MODEL_TYPES, RAM_SPECS, LOCATIONS] {
            let values: HashSet<_> = catalog.iter().map(|e| e.value).collect();
            assert_eq!(values.len(), catalog.len());
        }
    }

    #[test]
    fn resolves_location_key_and_label() {
        assert_eq!(
            resolve_location("uab"),
            Some("Universidade Aberta Brasileira")
        );
        assert_eq!(
            resolve_location("E.M.E.I. Abelhinhas"),
            Some("E.M.E.I. Abelhinhas")
        );
        assert_eq!(resolve_location("escola_inexistente"), None);
    }

    #[test]
    fn model_lookup_is_by_value() {
        assert!(find_value(MODEL_TYPES, "Notebook").is_some());
        assert!(find_value(MODEL_TYPES, "Caixa de Som").is_none());
    }
}
