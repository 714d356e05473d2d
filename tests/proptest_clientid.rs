use std::collections::HashMap;

use proptest::prelude::*;

use leasehold::{CidVariant, ClientId, Error, OPTION_CLIENT_IDENTIFIER};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2000))]

    #[test]
    fn hw_addr_constructor_is_total(data: Vec<u8>) {
        let id = ClientId::from_hw_addr(&data);
        prop_assert_eq!(id.variant(), CidVariant::HwAddress);
        prop_assert_eq!(id.data(), data.as_slice());
    }

    #[test]
    fn opt61_accepts_only_option_61(code: u8, data: Vec<u8>) {
        let result = ClientId::from_opt61(code, &data);
        if code == OPTION_CLIENT_IDENTIFIER {
            prop_assert!(result.is_ok());
        } else {
            prop_assert!(matches!(result, Err(Error::UnexpectedOptionCode(c)) if c == code));
        }
    }

    #[test]
    fn duid_iaid_prefixes_the_iaid(duid: Vec<u8>, iaid: [u8; 4]) {
        let id = ClientId::from_duid_iaid(&duid, iaid);
        prop_assert_eq!(id.variant(), CidVariant::DuidIaid);
        prop_assert_eq!(&id.data()[..4], &iaid);
        prop_assert_eq!(&id.data()[4..], duid.as_slice());
    }

    #[test]
    fn equality_follows_variant_and_data(first: Vec<u8>, second: Vec<u8>) {
        let hw_first = ClientId::from_hw_addr(&first);
        let hw_second = ClientId::from_hw_addr(&second);
        prop_assert_eq!(hw_first == hw_second, first == second);

        // The same bytes under different variants never collide.
        let duid_first = ClientId::from_duid(&first);
        prop_assert_ne!(hw_first, duid_first);
    }

    #[test]
    fn hashing_agrees_with_equality(data: Vec<u8>) {
        let mut map = HashMap::new();
        map.insert(ClientId::from_hw_addr(&data), ());
        map.insert(ClientId::from_duid(&data), ());
        map.insert(ClientId::experimental(&data), ());

        prop_assert_eq!(map.len(), 3);
        prop_assert!(map.contains_key(&ClientId::from_hw_addr(&data)));
    }

    #[test]
    fn display_is_colon_hex(data in prop::collection::vec(any::<u8>(), 0..64)) {
        let id = ClientId::experimental(&data);
        let rendered = id.to_string();

        let mut expected = "ff".to_string();
        for byte in &data {
            expected.push_str(&format!(":{:02x}", byte));
        }
        prop_assert_eq!(rendered, expected);
    }
}
