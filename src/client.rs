use crate::{
    error::{
        Error,
        Result,
    },
    types::{
        GRID_SIZE,
        GameData,
        Tier,
    },
};
use ethers::{
    contract::ContractCall,
    middleware::SignerMiddleware,
    providers::{
        Http,
        JsonRpcClient,
        Middleware,
        Provider,
    },
    signers::{
        LocalWallet,
        Signer,
    },
    types::{
        Address,
        H256,
        TransactionReceipt,
        U64,
        U256,
    },
    utils::format_ether,
};
use generated_abi::{
    DangerTiles,
    contract_instance,
};
use std::{
    future::Future,
    sync::Arc,
};
use tracing::{
    debug,
    info,
};

pub type SignerClient<P = Http> = SignerMiddleware<Provider<P>, LocalWallet>;

/// Receipt summary of a mined transaction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Confirmed {
    pub tx_hash: H256,
    pub block_number: Option<u64>,
}

/// Everything the bot and CLI need from the Danger Tiles contract. Writes
/// resolve only once the transaction is mined.
pub trait GameContract {
    /// Address of the loaded signer, if any.
    fn signer(&self) -> Option<Address>;

    fn join_game(&self, tier: Tier, value: U256) -> impl Future<Output = Result<Confirmed>>;

    fn make_move(&self, game_id: u64, tile: u8) -> impl Future<Output = Result<Confirmed>>;

    fn get_game(&self, game_id: u64) -> impl Future<Output = Result<GameData>>;

    /// Id of the game waiting for a second player in `tier`.
    fn get_waiting_game(&self, tier: Tier) -> impl Future<Output = Result<Option<u64>>>;

    fn get_required_payment(&self, tier: Tier) -> impl Future<Output = Result<U256>>;

    fn game_counter(&self) -> impl Future<Output = Result<u64>>;

    fn player_active_game(
        &self,
        player: Address,
    ) -> impl Future<Output = Result<Option<u64>>>;

    /// Only meaningful once the game is finished.
    fn get_dangerous_tiles(&self, game_id: u64) -> impl Future<Output = Result<[u8; 2]>>;

    fn balance(&self, who: Address) -> impl Future<Output = Result<U256>>;
}

/// Reads the tier's required payment (stake plus fee) and joins with it.
pub async fn join_with_required_payment<C: GameContract>(
    contract: &C,
    tier: Tier,
) -> Result<Confirmed> {
    if contract.signer().is_none() {
        return Err(Error::WalletMissing);
    }
    let payment = contract.get_required_payment(tier).await?;
    info!(%tier, payment = %format_mon(payment), "joining game");
    contract.join_game(tier, payment).await
}

/// Native amount in MON with two decimals.
pub fn format_mon(wei: U256) -> String {
    let units = format_ether(wei);
    match units.parse::<f64>() {
        Ok(value) => format!("{value:.2}"),
        Err(_) => units,
    }
}

pub(crate) fn game_id_from(raw: U256) -> Result<u64> {
    if raw > U256::from(u64::MAX) {
        return Err(Error::Decode(format!("game id {raw} does not fit in u64")));
    }
    Ok(raw.as_u64())
}

fn non_zero_id(raw: U256) -> Result<Option<u64>> {
    let id = game_id_from(raw)?;
    Ok((id != 0).then_some(id))
}

pub struct ContractClient<P = Http> {
    provider: Arc<Provider<P>>,
    reader: DangerTiles<Provider<P>>,
    writer: Option<DangerTiles<SignerClient<P>>>,
    signer_address: Option<Address>,
}

impl ContractClient<Http> {
    /// Connects to `rpc_url` and refuses to go on when the node reports a
    /// chain other than `expected_chain_id`. Without a wallet the client is
    /// read-only and every write fails with [`Error::WalletMissing`].
    pub async fn connect(
        rpc_url: &str,
        contract: Address,
        expected_chain_id: u64,
        wallet: Option<LocalWallet>,
    ) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| Error::Config(format!("invalid rpc url {rpc_url}: {e}")))?;
        let client =
            Self::from_provider(provider, contract, expected_chain_id, wallet).await?;
        info!(rpc_url, chain_id = expected_chain_id, ?contract, "connected to rpc");
        Ok(client)
    }
}

impl<P: JsonRpcClient + Clone + 'static> ContractClient<P> {
    /// Same as [`ContractClient::connect`] over an already built provider.
    pub async fn from_provider(
        provider: Provider<P>,
        contract: Address,
        expected_chain_id: u64,
        wallet: Option<LocalWallet>,
    ) -> Result<Self> {
        let actual = provider.get_chainid().await?.as_u64();
        if actual != expected_chain_id {
            return Err(Error::WrongNetwork {
                expected: expected_chain_id,
                actual,
            });
        }

        let provider = Arc::new(provider);
        let reader = contract_instance(contract, provider.clone());
        let (writer, signer_address) = match wallet {
            Some(wallet) => {
                let wallet = wallet.with_chain_id(expected_chain_id);
                let address = wallet.address();
                let client = SignerMiddleware::new(provider.as_ref().clone(), wallet);
                (
                    Some(contract_instance(contract, Arc::new(client))),
                    Some(address),
                )
            }
            None => (None, None),
        };

        Ok(Self {
            provider,
            reader,
            writer,
            signer_address,
        })
    }

    fn writer(&self) -> Result<&DangerTiles<SignerClient<P>>> {
        self.writer.as_ref().ok_or(Error::WalletMissing)
    }
}

async fn send_and_confirm<M: Middleware + 'static>(
    label: &str,
    call: ContractCall<M, ()>,
) -> Result<Confirmed> {
    let pending = call.send().await?;
    let tx_hash = *pending;
    debug!(label, ?tx_hash, "transaction submitted");
    let receipt = pending.await?;
    confirm_receipt(label, tx_hash, receipt)
}

/// A missing receipt means the transaction was dropped; status 0 means it
/// was mined and reverted.
fn confirm_receipt(
    label: &str,
    tx_hash: H256,
    receipt: Option<TransactionReceipt>,
) -> Result<Confirmed> {
    let receipt = receipt.ok_or(Error::Dropped)?;
    if receipt.status == Some(U64::zero()) {
        return Err(Error::Reverted(format!("{label} transaction {tx_hash:?}")));
    }
    let block_number = receipt.block_number.map(|n| n.as_u64());
    info!(label, ?tx_hash, ?block_number, "transaction confirmed");
    Ok(Confirmed {
        tx_hash,
        block_number,
    })
}

impl<P: JsonRpcClient + Clone + 'static> GameContract for ContractClient<P> {
    fn signer(&self) -> Option<Address> {
        self.signer_address
    }

    async fn join_game(&self, tier: Tier, value: U256) -> Result<Confirmed> {
        let call = self.writer()?.join_game(tier.index()).value(value);
        send_and_confirm("joinGame", call).await
    }

    async fn make_move(&self, game_id: u64, tile: u8) -> Result<Confirmed> {
        if tile >= GRID_SIZE {
            return Err(Error::InvalidTile(tile));
        }
        let call = self.writer()?.make_move(U256::from(game_id), tile);
        send_and_confirm("makeMove", call).await
    }

    async fn get_game(&self, game_id: u64) -> Result<GameData> {
        let raw = self.reader.get_game(U256::from(game_id)).call().await?;
        GameData::try_from(raw)
    }

    async fn get_waiting_game(&self, tier: Tier) -> Result<Option<u64>> {
        let raw = self.reader.get_waiting_game(tier.index()).call().await?;
        non_zero_id(raw)
    }

    async fn get_required_payment(&self, tier: Tier) -> Result<U256> {
        Ok(self.reader.get_required_payment(tier.index()).call().await?)
    }

    async fn game_counter(&self) -> Result<u64> {
        let raw = self.reader.game_counter().call().await?;
        game_id_from(raw)
    }

    async fn player_active_game(&self, player: Address) -> Result<Option<u64>> {
        let raw = self.reader.player_active_game(player).call().await?;
        non_zero_id(raw)
    }

    async fn get_dangerous_tiles(&self, game_id: u64) -> Result<[u8; 2]> {
        let (first, second) = self
            .reader
            .get_dangerous_tiles(U256::from(game_id))
            .call()
            .await?;
        Ok([first, second])
    }

    async fn balance(&self, who: Address) -> Result<U256> {
        Ok(self.provider.get_balance(who, None).await?)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::types::GameState;
    use ethers::{
        abi::{
            Token,
            encode,
        },
        providers::{
            JsonRpcError,
            MockProvider,
            MockResponse,
        },
        types::Bytes,
    };

    const CHAIN_ID: u64 = 10143;

    fn contract_address() -> Address {
        Address::from([0xdd; 20])
    }

    /// Mock responses are served last in, first out, so `responses` is given
    /// in request order and pushed in reverse.
    async fn mocked_client(
        responses: Vec<MockResponse>,
    ) -> Result<(ContractClient<MockProvider>, MockProvider)> {
        let (provider, mock) = Provider::mocked();
        for response in responses.into_iter().rev() {
            mock.push_response(response);
        }
        let client =
            ContractClient::from_provider(provider, contract_address(), CHAIN_ID, None)
                .await?;
        Ok((client, mock))
    }

    fn json<T: serde::Serialize>(value: T) -> MockResponse {
        MockResponse::Value(serde_json::to_value(value).unwrap())
    }

    fn revert(reason: &str) -> MockResponse {
        // Error(string) selector followed by the abi encoded reason.
        let mut data = vec![0x08, 0xc3, 0x79, 0xa0];
        data.extend(encode(&[Token::String(reason.to_string())]));
        MockResponse::Error(JsonRpcError {
            code: 3,
            message: format!("execution reverted: {reason}"),
            data: Some(serde_json::Value::String(format!("0x{}", hex::encode(data)))),
        })
    }

    #[tokio::test]
    async fn from_provider__rejects_a_node_on_another_chain() {
        // when
        let result = mocked_client(vec![json(U256::from(31337u64))]).await;

        // then
        assert!(matches!(
            result,
            Err(Error::WrongNetwork {
                expected: CHAIN_ID,
                actual: 31337
            })
        ));
    }

    #[tokio::test]
    async fn from_provider__without_wallet_is_read_only() {
        // given
        let (client, _) = mocked_client(vec![json(U256::from(CHAIN_ID))])
            .await
            .unwrap();

        // when
        let result = client.make_move(1, 3).await;

        // then
        assert_eq!(client.signer(), None);
        assert!(matches!(result, Err(Error::WalletMissing)));
    }

    #[tokio::test]
    async fn get_game__decodes_the_game_tuple() {
        // given
        let player1 = Address::from([0xa1; 20]);
        let player2 = Address::from([0xb2; 20]);
        let encoded = encode(&[
            Token::Address(player1),
            Token::Address(player2),
            Token::Uint(U256::from(1u8)),
            Token::Uint(U256::exp10(18) * U256::from(5u8)),
            Token::Uint(U256::from(2u8)),
            Token::Address(player2),
            Token::Address(Address::zero()),
            Token::Uint(U256::from(0b101u8)),
        ]);
        let (client, _) = mocked_client(vec![
            json(U256::from(CHAIN_ID)),
            json(Bytes::from(encoded)),
        ])
        .await
        .unwrap();

        // when
        let game = client.get_game(7).await.unwrap();

        // then
        assert_eq!(game.player1, player1);
        assert_eq!(game.tier, Tier::FiveMon);
        assert_eq!(game.state, GameState::InProgress);
        assert_eq!(game.current_turn, player2);
        assert_eq!(game.revealed_tiles.revealed().collect::<Vec<_>>(), vec![0, 2]);
    }

    #[tokio::test]
    async fn get_game__surfaces_the_revert_reason() {
        // given
        let (client, _) = mocked_client(vec![
            json(U256::from(CHAIN_ID)),
            revert("Game does not exist"),
        ])
        .await
        .unwrap();

        // when
        let result = client.get_game(99).await;

        // then
        assert!(
            matches!(&result, Err(Error::Reverted(reason)) if reason == "Game does not exist"),
            "{result:?}"
        );
    }

    #[tokio::test]
    async fn get_waiting_game__maps_rpc_failures_to_transient_errors() {
        // given
        let (client, _) = mocked_client(vec![
            json(U256::from(CHAIN_ID)),
            MockResponse::Error(JsonRpcError {
                code: -32000,
                message: "header not found".to_string(),
                data: None,
            }),
        ])
        .await
        .unwrap();

        // when
        let result = client.get_waiting_game(Tier::OneMon).await;

        // then
        assert!(result.unwrap_err().is_transient());
    }

    #[test]
    fn confirm_receipt__treats_status_zero_as_reverted() {
        // given
        let receipt = TransactionReceipt {
            status: Some(U64::zero()),
            block_number: Some(U64::from(12u64)),
            ..Default::default()
        };

        // when
        let result = confirm_receipt("makeMove", H256::repeat_byte(1), Some(receipt));

        // then
        assert!(matches!(result, Err(Error::Reverted(_))));
    }

    #[test]
    fn confirm_receipt__treats_missing_receipt_as_dropped() {
        assert!(matches!(
            confirm_receipt("joinGame", H256::repeat_byte(2), None),
            Err(Error::Dropped)
        ));
    }

    #[test]
    fn confirm_receipt__reports_hash_and_block_of_a_successful_receipt() {
        // given
        let receipt = TransactionReceipt {
            status: Some(U64::one()),
            block_number: Some(U64::from(12u64)),
            ..Default::default()
        };

        // when
        let confirmed = confirm_receipt("joinGame", H256::repeat_byte(3), Some(receipt)).unwrap();

        // then
        assert_eq!(
            confirmed,
            Confirmed {
                tx_hash: H256::repeat_byte(3),
                block_number: Some(12),
            }
        );
    }

    #[test]
    fn format_mon__rounds_to_two_decimals() {
        // given
        let wei = U256::exp10(18) * U256::from(11u64) / U256::from(4u64);

        // then
        assert_eq!(format_mon(wei), "2.75");
        assert_eq!(format_mon(U256::zero()), "0.00");
    }

    #[test]
    fn non_zero_id__treats_zero_as_absent() {
        assert_eq!(non_zero_id(U256::zero()).unwrap(), None);
        assert_eq!(non_zero_id(U256::from(42u64)).unwrap(), Some(42));
    }

    #[test]
    fn game_id_from__rejects_ids_wider_than_u64() {
        // given
        let raw = U256::from(u64::MAX) + U256::one();

        // then
        assert!(matches!(game_id_from(raw), Err(Error::Decode(_))));
    }
}
